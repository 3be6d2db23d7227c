//! Dump the structure of an HDF5 file given on the command line:
//! superblock fields, root-header messages and root attributes.

use h5f::object::classify;
use h5f::{FileBackend, GlobalHeapCache, Hdf5File};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: dump_file <file.h5>")?;

    let mut file = Hdf5File::open(FileBackend::open(path)?)?;
    let sb = file.superblock().clone();
    println!(
        "superblock v{} (offsets {} bytes, lengths {} bytes)",
        sb.version, sb.offset_size, sb.length_size
    );
    println!(
        "root object header at {:#x}, eof {:#x}",
        sb.root_header_address, sb.end_of_file_address
    );

    let root = file.root_header()?;
    println!("root: {:?}, {} messages", classify(&root), root.messages.len());
    for message in &root.messages {
        println!("  message type {:#04x}, {} bytes", message.type_id, message.body.len());
    }

    let mut gheap = GlobalHeapCache::new();
    for attribute in h5f::attr::read_attributes(file.backend_mut(), &sb, &root)? {
        let values = h5f::attr::attribute_values(&attribute, &sb, file.backend_mut(), &mut gheap)?;
        println!("  attribute {:?} = {:?}", attribute.name, values);
    }
    Ok(())
}
