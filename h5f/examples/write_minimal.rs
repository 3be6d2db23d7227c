//! Create a minimal HDF5 file with a couple of root attributes and
//! read it back.

use h5f::message::{Attribute, Dataspace, Datatype};
use h5f::{EngineConfig, FileWriter, GlobalHeapCache, Hdf5File, MemoryBackend};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = FileWriter::create(MemoryBackend::new(), EngineConfig::default())?;

    writer.add_root_attribute(&Attribute::new(
        "version",
        Datatype::int32(),
        Dataspace::simple(vec![1]),
        42i32.to_le_bytes().to_vec(),
    ))?;
    writer.add_root_attribute(&Attribute::new(
        "scale",
        Datatype::ieee_float(8)?,
        Dataspace::simple(vec![1]),
        0.25f64.to_le_bytes().to_vec(),
    ))?;

    let bytes = writer.into_backend().into_inner();
    println!("wrote {} bytes", bytes.len());

    let mut file = Hdf5File::open(MemoryBackend::from_vec(bytes))?;
    let sb = file.superblock().clone();
    println!(
        "superblock v{}, root header at {:#x}, eof {:#x}",
        sb.version, sb.root_header_address, sb.end_of_file_address
    );

    let root = file.root_header()?;
    let mut gheap = GlobalHeapCache::new();
    for attribute in h5f::attr::read_attributes(file.backend_mut(), &sb, &root)? {
        let values = h5f::attr::attribute_values(&attribute, &sb, file.backend_mut(), &mut gheap)?;
        println!("{} = {:?}", attribute.name, values);
    }
    Ok(())
}
