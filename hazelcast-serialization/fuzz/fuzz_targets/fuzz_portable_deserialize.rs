#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;

use hazelcast_serialization::serialization::{
    Portable, PortableFactory, PortableReader, PortableWriter,
};
use hazelcast_serialization::{
    Data, HazelcastObject, Result, SerializationConfig, SerializationService,
};

#[derive(Debug, Default)]
struct Node {
    label: Option<String>,
    weight: f64,
    flags: Option<Vec<bool>>,
    tags: Option<Vec<String>>,
    next: Option<Box<Node>>,
}

impl HazelcastObject for Node {
    fn as_portable(&self) -> Option<&dyn Portable> {
        Some(self)
    }
}

impl Portable for Node {
    fn factory_id(&self) -> i32 {
        3
    }

    fn class_id(&self) -> i32 {
        1
    }

    fn write_portable(&self, writer: &mut dyn PortableWriter) -> Result<()> {
        writer.write_string("label", self.label.as_deref())?;
        writer.write_double("weight", self.weight)?;
        writer.write_bool_array("flags", self.flags.as_deref())?;
        writer.write_string_array("tags", self.tags.as_deref())?;
        writer.write_portable("next", self.next.as_deref().map(|n| n as &dyn Portable))
    }

    fn read_portable(&mut self, reader: &mut dyn PortableReader) -> Result<()> {
        self.label = reader.read_string("label")?;
        self.weight = reader.read_double("weight")?;
        self.flags = reader.read_bool_array("flags")?;
        self.tags = reader.read_string_array("tags")?;
        self.next = match reader.read_portable("next")? {
            Some(next) => next.into_any().downcast::<Node>().ok(),
            None => None,
        };
        Ok(())
    }
}

struct NodeFactory;

impl PortableFactory for NodeFactory {
    fn factory_id(&self) -> i32 {
        3
    }

    fn create(&self, class_id: i32) -> Option<Box<dyn Portable>> {
        (class_id == 1).then(|| Box::new(Node::default()) as Box<dyn Portable>)
    }
}

fn sample() -> Node {
    Node {
        label: Some("head".to_string()),
        weight: 0.75,
        flags: Some(vec![true, false]),
        tags: Some(vec!["a".to_string(), "bc".to_string()]),
        next: Some(Box::new(Node {
            label: Some("tail".to_string()),
            ..Node::default()
        })),
    }
}

// The input is a list of (offset, xor mask) pairs applied to a valid blob.
fuzz_target!(|input: &[u8]| {
    let config = match SerializationConfig::builder()
        .add_portable_factory(Arc::new(NodeFactory))
        .build()
    {
        Ok(config) => config,
        Err(_) => return,
    };
    let service = match SerializationService::new(config) {
        Ok(service) => service,
        Err(_) => return,
    };
    let mut bytes = match service.to_data(&sample()) {
        Ok(data) => data.as_bytes().to_vec(),
        Err(_) => return,
    };

    for pair in input.chunks_exact(2) {
        let offset = 8 + pair[0] as usize % (bytes.len() - 8);
        bytes[offset] ^= pair[1];
    }
    if input.len() % 2 == 1 {
        bytes.truncate(8 + input[input.len() - 1] as usize % (bytes.len() - 7));
    }

    if let Ok(blob) = Data::new(bytes) {
        let _ = service.to_object(&blob);
    }
});
