//! Serialization/deserialization throughput benchmarks.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hazelcast_serialization::serialization::{
    Compact, CompactFactory, CompactReader, CompactWriter, DataSerializableFactory,
    IdentifiedDataSerializable, Portable, PortableFactory, PortableReader, PortableWriter,
};
use hazelcast_serialization::{
    DataInput, DataOutput, HazelcastObject, Result, SerializationConfig, SerializationService,
};

#[derive(Debug, Default)]
struct Person {
    id: i32,
    age: i16,
    score: f64,
    name: Option<String>,
}

impl HazelcastObject for Person {
    fn as_portable(&self) -> Option<&dyn Portable> {
        Some(self)
    }
}

impl Portable for Person {
    fn factory_id(&self) -> i32 {
        1
    }

    fn class_id(&self) -> i32 {
        1
    }

    fn write_portable(&self, writer: &mut dyn PortableWriter) -> Result<()> {
        writer.write_int("id", self.id)?;
        writer.write_short("age", self.age)?;
        writer.write_double("score", self.score)?;
        writer.write_string("name", self.name.as_deref())
    }

    fn read_portable(&mut self, reader: &mut dyn PortableReader) -> Result<()> {
        self.id = reader.read_int("id")?;
        self.age = reader.read_short("age")?;
        self.score = reader.read_double("score")?;
        self.name = reader.read_string("name")?;
        Ok(())
    }
}

struct PersonFactory;

impl PortableFactory for PersonFactory {
    fn factory_id(&self) -> i32 {
        1
    }

    fn create(&self, class_id: i32) -> Option<Box<dyn Portable>> {
        (class_id == 1).then(|| Box::new(Person::default()) as Box<dyn Portable>)
    }
}

#[derive(Debug, Default)]
struct Reading {
    sensor: i64,
    values: Vec<f64>,
}

impl HazelcastObject for Reading {
    fn as_identified(&self) -> Option<&dyn IdentifiedDataSerializable> {
        Some(self)
    }
}

impl IdentifiedDataSerializable for Reading {
    fn factory_id(&self) -> i32 {
        2
    }

    fn class_id(&self) -> i32 {
        1
    }

    fn write_data(&self, output: &mut dyn DataOutput) -> Result<()> {
        output.write_long(self.sensor)?;
        output.write_double_array(Some(self.values.as_slice()))
    }

    fn read_data(&mut self, input: &mut dyn DataInput) -> Result<()> {
        self.sensor = input.read_long()?;
        self.values = input.read_double_array()?.unwrap_or_default();
        Ok(())
    }
}

struct ReadingFactory;

impl DataSerializableFactory for ReadingFactory {
    fn create(&self, class_id: i32) -> Option<Box<dyn IdentifiedDataSerializable>> {
        (class_id == 1).then(|| Box::new(Reading::default()) as Box<dyn IdentifiedDataSerializable>)
    }
}

#[derive(Debug, Default)]
struct Point {
    x: i32,
    y: i32,
    label: Option<String>,
}

impl HazelcastObject for Point {
    fn as_compact(&self) -> Option<&dyn Compact> {
        Some(self)
    }
}

impl Compact for Point {
    fn type_name(&self) -> &str {
        "point"
    }

    fn write_compact(&self, writer: &mut dyn CompactWriter) -> Result<()> {
        writer.write_int32("x", self.x)?;
        writer.write_int32("y", self.y)?;
        writer.write_string("label", self.label.as_deref())
    }

    fn read_compact(&mut self, reader: &mut dyn CompactReader) -> Result<()> {
        self.x = reader.read_int32("x")?;
        self.y = reader.read_int32("y")?;
        self.label = reader.read_string("label")?;
        Ok(())
    }
}

struct PointFactory;

impl CompactFactory for PointFactory {
    fn type_name(&self) -> &str {
        "point"
    }

    fn create(&self) -> Box<dyn Compact> {
        Box::new(Point::default())
    }
}

fn service() -> SerializationService {
    let config = SerializationConfig::builder()
        .add_portable_factory(Arc::new(PersonFactory))
        .add_data_serializable_factory(2, Arc::new(ReadingFactory))
        .add_compact_factory(Arc::new(PointFactory))
        .build()
        .unwrap();
    SerializationService::new(config).unwrap()
}

fn bench_builtin(c: &mut Criterion) {
    let service = service();
    let mut group = c.benchmark_group("builtin");

    group.bench_function("i64_to_data", |b| {
        b.iter(|| black_box(service.to_data(black_box(&123_456_789i64)).unwrap()))
    });

    for size in [16usize, 256, 4096] {
        let text = "x".repeat(size);
        let data = service.to_data(&text).unwrap();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("string_to_data", size), &text, |b, text| {
            b.iter(|| black_box(service.to_data(text).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("string_to_object", size), &data, |b, data| {
            b.iter(|| black_box(service.to_object(data).unwrap()))
        });
    }

    group.finish();
}

fn bench_portable(c: &mut Criterion) {
    let service = service();
    let person = Person {
        id: 7,
        age: 41,
        score: 99.5,
        name: Some("Ada Lovelace".to_string()),
    };
    let data = service.to_data(&person).unwrap();
    let mut group = c.benchmark_group("portable");

    group.bench_function("to_data", |b| {
        b.iter(|| black_box(service.to_data(black_box(&person)).unwrap()))
    });
    group.bench_function("to_object", |b| {
        b.iter(|| black_box(service.to_object(black_box(&data)).unwrap()))
    });

    group.finish();
}

fn bench_identified(c: &mut Criterion) {
    let service = service();
    let mut group = c.benchmark_group("identified");

    for len in [8usize, 512] {
        let reading = Reading {
            sensor: 3,
            values: (0..len).map(|i| i as f64).collect(),
        };
        let data = service.to_data(&reading).unwrap();
        group.bench_with_input(BenchmarkId::new("to_data", len), &reading, |b, reading| {
            b.iter(|| black_box(service.to_data(reading).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("to_object", len), &data, |b, data| {
            b.iter(|| black_box(service.to_object(data).unwrap()))
        });
    }

    group.finish();
}

fn bench_compact(c: &mut Criterion) {
    let service = service();
    let point = Point {
        x: 10,
        y: -10,
        label: Some("origin".to_string()),
    };
    let data = service.to_data(&point).unwrap();
    let mut group = c.benchmark_group("compact");

    group.bench_function("to_data", |b| {
        b.iter(|| black_box(service.to_data(black_box(&point)).unwrap()))
    });
    group.bench_function("to_object", |b| {
        b.iter(|| black_box(service.to_object(black_box(&data)).unwrap()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_builtin,
    bench_portable,
    bench_identified,
    bench_compact
);
criterion_main!(benches);
