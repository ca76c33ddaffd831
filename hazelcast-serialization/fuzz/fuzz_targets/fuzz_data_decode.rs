#![no_main]

use libfuzzer_sys::fuzz_target;

use hazelcast_serialization::{Data, SerializationConfig, SerializationService};

// Arbitrary bytes framed as a blob must decode or fail, never panic.
fuzz_target!(|data: &[u8]| {
    let service = match SerializationService::new(SerializationConfig::default()) {
        Ok(service) => service,
        Err(_) => return,
    };
    if let Ok(blob) = Data::new(data.to_vec()) {
        let _ = blob.partition_hash();
        let _ = service.to_object(&blob);
        let _ = service.try_to_object(&blob);
    }
});
