//! End-to-end dispatch through the serialization service.

use std::any::{Any, TypeId};
use std::str::FromStr;
use std::sync::Arc;
use std::thread;

use rust_decimal::Decimal;
use uuid::Uuid;

use hazelcast_serialization::serialization::{
    DataSerializableFactory, HazelcastJsonValue, IdentifiedDataSerializable, Serializer,
    DECIMAL_TYPE_ID, IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID, JSON_TYPE_ID, STRING_TYPE_ID,
    UUID_TYPE_ID,
};
use hazelcast_serialization::{
    compute_partition_hash, ByteOrder, Data, DataInput, DataOutput, HazelcastError,
    HazelcastObject, PartitionAware, Result, SerializationConfig, SerializationService,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn service() -> SerializationService {
    init_tracing();
    SerializationService::new(SerializationConfig::default()).unwrap()
}

fn round_trip<T>(service: &SerializationService, value: T) -> T
where
    T: HazelcastObject + Any,
{
    let data = service.to_data(&value).unwrap();
    service.to_object_as::<T>(&data).unwrap().unwrap()
}

#[test]
fn test_builtin_values_round_trip() {
    let service = service();
    assert_eq!(round_trip(&service, -5i8), -5);
    assert!(round_trip(&service, true));
    assert_eq!(round_trip(&service, 'λ'), 'λ');
    assert_eq!(round_trip(&service, i16::MIN), i16::MIN);
    assert_eq!(round_trip(&service, i64::MAX), i64::MAX);
    assert_eq!(round_trip(&service, 1.25f32), 1.25);
    assert_eq!(round_trip(&service, "naïve".to_string()), "naïve");
    assert_eq!(round_trip(&service, vec![1u8, 2, 255]), vec![1u8, 2, 255]);
    assert_eq!(round_trip(&service, vec![true, false]), vec![true, false]);
    assert_eq!(round_trip(&service, vec!['a', 'b']), vec!['a', 'b']);
    assert_eq!(round_trip(&service, vec![1i16, -1]), vec![1i16, -1]);
    assert_eq!(round_trip(&service, vec![i32::MIN]), vec![i32::MIN]);
    assert_eq!(round_trip(&service, vec![7i64]), vec![7i64]);
    assert_eq!(round_trip(&service, vec![0.5f32]), vec![0.5f32]);
    assert_eq!(round_trip(&service, vec![-0.25f64]), vec![-0.25f64]);
    assert_eq!(
        round_trip(&service, vec!["x".to_string(), "yz".to_string()]),
        vec!["x".to_string(), "yz".to_string()]
    );
}

#[test]
fn test_uuid_decimal_and_json() {
    let service = service();
    let uuid = Uuid::from_u128(0x1234_5678_9abc_def0_0fed_cba9_8765_4321);
    let data = service.to_data(&uuid).unwrap();
    assert_eq!(data.type_id(), UUID_TYPE_ID);
    assert_eq!(service.to_object_as::<Uuid>(&data).unwrap(), Some(uuid));

    let decimal = Decimal::from_str("98765.4321").unwrap();
    let data = service.to_data(&decimal).unwrap();
    assert_eq!(data.type_id(), DECIMAL_TYPE_ID);
    assert_eq!(service.to_object_as::<Decimal>(&data).unwrap(), Some(decimal));

    let json = HazelcastJsonValue::from_string(r#"{"k":[1,2]}"#);
    let data = service.to_data(&json).unwrap();
    assert_eq!(data.type_id(), JSON_TYPE_ID);
    assert_eq!(
        service.to_object_as::<HazelcastJsonValue>(&data).unwrap(),
        Some(json)
    );
}

#[test]
fn test_equal_values_give_equal_blobs() {
    let service = service();
    let a = service.to_data(&"same".to_string()).unwrap();
    let b = service.to_data(&"same".to_string()).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, service.to_data(&"other".to_string()).unwrap());
}

#[test]
fn test_unset_partition_hash_falls_back_to_payload_hash() {
    let service = service();
    let data = service.to_data(&"key".to_string()).unwrap();
    assert_eq!(&data.as_bytes()[..4], &[0, 0, 0, 0]);
    assert_eq!(data.type_id(), STRING_TYPE_ID);
    assert!(!data.has_partition_hash());
    assert_eq!(data.partition_hash(), compute_partition_hash(data.payload()));
    assert_ne!(data.partition_hash(), 0);
}

#[test]
fn test_little_endian_payload_keeps_big_endian_header() {
    let config = SerializationConfig::builder()
        .byte_order(ByteOrder::LittleEndian)
        .build()
        .unwrap();
    let service = SerializationService::new(config).unwrap();
    let data = service.to_data(&0x0102_0304i32).unwrap();
    assert_eq!(&data.as_bytes()[4..8], &(-7i32).to_be_bytes());
    assert_eq!(data.payload(), &[4, 3, 2, 1]);
    assert_eq!(service.to_object_as::<i32>(&data).unwrap(), Some(0x0102_0304));
}

#[derive(Debug, Default, PartialEq)]
struct Order {
    id: i64,
    customer: String,
    lines: Vec<i32>,
    note: Option<String>,
}

impl HazelcastObject for Order {
    fn as_identified(&self) -> Option<&dyn IdentifiedDataSerializable> {
        Some(self)
    }
}

impl IdentifiedDataSerializable for Order {
    fn factory_id(&self) -> i32 {
        7
    }

    fn class_id(&self) -> i32 {
        1
    }

    fn write_data(&self, output: &mut dyn DataOutput) -> Result<()> {
        output.write_long(self.id)?;
        output.write_string(Some(self.customer.as_str()))?;
        output.write_int_array(Some(self.lines.as_slice()))?;
        output.write_object(self.note.as_ref().map(|n| n as &dyn HazelcastObject))
    }

    fn read_data(&mut self, input: &mut dyn DataInput) -> Result<()> {
        self.id = input.read_long()?;
        self.customer = input.read_string()?.unwrap_or_default();
        self.lines = input.read_int_array()?.unwrap_or_default();
        self.note = input
            .read_object()?
            .and_then(|value| value.downcast::<String>().ok())
            .map(|note| *note);
        Ok(())
    }
}

struct OrderFactory;

impl DataSerializableFactory for OrderFactory {
    fn create(&self, class_id: i32) -> Option<Box<dyn IdentifiedDataSerializable>> {
        match class_id {
            1 => Some(Box::new(Order::default())),
            _ => None,
        }
    }
}

fn order_service() -> SerializationService {
    let config = SerializationConfig::builder()
        .add_data_serializable_factory(7, Arc::new(OrderFactory))
        .build()
        .unwrap();
    SerializationService::new(config).unwrap()
}

#[test]
fn test_identified_round_trip() {
    let service = order_service();
    let order = Order {
        id: 10,
        customer: "acme".to_string(),
        lines: vec![3, 1, 2],
        note: Some("fragile".to_string()),
    };
    let data = service.to_data(&order).unwrap();
    assert_eq!(data.type_id(), IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID);
    assert_eq!(data.payload()[0], 1);
    assert_eq!(service.to_object_as::<Order>(&data).unwrap(), Some(order));
}

#[test]
fn test_unregistered_identified_factory_is_named() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0i32.to_be_bytes());
    bytes.extend_from_slice(&IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID.to_be_bytes());
    bytes.push(1);
    bytes.extend_from_slice(&99i32.to_be_bytes());
    bytes.extend_from_slice(&1i32.to_be_bytes());
    let data = Data::new(bytes).unwrap();

    let err = order_service().to_object(&data).unwrap_err();
    assert!(matches!(err, HazelcastError::Serialization(_)));
    assert!(err.to_string().contains("99"));
}

#[test]
fn test_truncated_identified_data_names_factory_and_class() {
    let service = order_service();
    let data = service
        .to_data(&Order {
            id: 1,
            customer: "c".to_string(),
            ..Order::default()
        })
        .unwrap();
    let cut = Data::new(data.as_bytes()[..data.total_size() - 3].to_vec()).unwrap();
    let err = service.to_object(&cut).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("factory 7"), "{message}");
    assert!(message.contains("class 1"), "{message}");
}

trait Shape: Send + Sync {
    fn area(&self) -> f64;
}

#[derive(Debug, PartialEq)]
struct Square(f64);

impl Shape for Square {
    fn area(&self) -> f64 {
        self.0 * self.0
    }
}

impl HazelcastObject for Square {
    fn interfaces(&self) -> Vec<TypeId> {
        vec![TypeId::of::<dyn Shape>()]
    }
}

/// Writes any shape as its area.
struct ShapeSerializer;

impl Serializer for ShapeSerializer {
    fn wire_type_id(&self) -> i32 {
        40
    }

    fn write(&self, output: &mut dyn DataOutput, value: &dyn HazelcastObject) -> Result<()> {
        let square = value.as_any().downcast_ref::<Square>().ok_or_else(|| {
            HazelcastError::Serialization(format!("not a shape: {}", value.concrete_type_name()))
        })?;
        output.write_double(square.area())
    }

    fn read(&self, input: &mut dyn DataInput) -> Result<Box<dyn Any + Send + Sync>> {
        Ok(Box::new(Square(input.read_double()?.sqrt())))
    }
}

struct Base;

#[derive(Debug, PartialEq)]
struct Derived(i32);

impl HazelcastObject for Derived {
    fn base_types(&self) -> Vec<TypeId> {
        vec![TypeId::of::<Base>()]
    }
}

struct BaseSerializer;

impl Serializer for BaseSerializer {
    fn wire_type_id(&self) -> i32 {
        41
    }

    fn write(&self, output: &mut dyn DataOutput, value: &dyn HazelcastObject) -> Result<()> {
        match value.as_any().downcast_ref::<Derived>() {
            Some(derived) => output.write_int(derived.0),
            None => Err(HazelcastError::Serialization("not derived".to_string())),
        }
    }

    fn read(&self, input: &mut dyn DataInput) -> Result<Box<dyn Any + Send + Sync>> {
        Ok(Box::new(Derived(input.read_int()?)))
    }
}

#[test]
fn test_custom_serializer_found_through_interface() {
    let config = SerializationConfig::builder()
        .add_custom_serializer::<dyn Shape>(Arc::new(ShapeSerializer))
        .build()
        .unwrap();
    let service = SerializationService::new(config).unwrap();
    let data = service.to_data(&Square(3.0)).unwrap();
    assert_eq!(data.type_id(), 40);
    assert_eq!(service.to_object_as::<Square>(&data).unwrap(), Some(Square(3.0)));
    // the cached match answers the second lookup
    assert_eq!(service.to_data(&Square(2.0)).unwrap().type_id(), 40);
}

#[test]
fn test_custom_serializer_found_through_base_type() {
    let service = service();
    service
        .register_custom_serializer::<Base>(Arc::new(BaseSerializer))
        .unwrap();
    let data = service.to_data(&Derived(12)).unwrap();
    assert_eq!(data.type_id(), 41);
    assert_eq!(service.to_object_as::<Derived>(&data).unwrap(), Some(Derived(12)));
}

#[test]
fn test_builtin_type_cannot_be_rebound() {
    let service = service();
    let err = service
        .register_constant_serializer::<String>(Arc::new(BaseSerializer))
        .unwrap_err();
    assert!(matches!(err, HazelcastError::Registration(_)));
}

struct Session {
    tenant: String,
    id: i64,
}

impl PartitionAware for Session {
    fn partition_key(&self) -> &dyn HazelcastObject {
        &self.tenant
    }
}

impl HazelcastObject for Session {
    fn as_partition_aware(&self) -> Option<&dyn PartitionAware> {
        Some(self)
    }
}

struct SessionSerializer;

impl Serializer for SessionSerializer {
    fn wire_type_id(&self) -> i32 {
        50
    }

    fn write(&self, output: &mut dyn DataOutput, value: &dyn HazelcastObject) -> Result<()> {
        let session = value
            .as_any()
            .downcast_ref::<Session>()
            .ok_or_else(|| HazelcastError::Serialization("not a session".to_string()))?;
        output.write_long(session.id)
    }

    fn read(&self, input: &mut dyn DataInput) -> Result<Box<dyn Any + Send + Sync>> {
        Ok(Box::new(input.read_long()?))
    }
}

#[test]
fn test_partition_aware_values_colocate() {
    let config = SerializationConfig::builder()
        .add_custom_serializer::<Session>(Arc::new(SessionSerializer))
        .build()
        .unwrap();
    let service = SerializationService::new(config).unwrap();
    let a = service
        .to_data(&Session {
            tenant: "t1".to_string(),
            id: 1,
        })
        .unwrap();
    let b = service
        .to_data(&Session {
            tenant: "t1".to_string(),
            id: 2,
        })
        .unwrap();
    assert!(a.has_partition_hash());
    assert_eq!(a.partition_hash(), b.partition_hash());
    assert_ne!(a, b);
    let tenant = service.to_data(&"t1".to_string()).unwrap();
    assert_eq!(a.partition_hash(), tenant.partition_hash());
}

#[test]
fn test_concurrent_use_from_many_threads() {
    let service = Arc::new(order_service());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for i in 0..100 {
                    let order = Order {
                        id: t * 1000 + i,
                        customer: format!("c{t}"),
                        lines: vec![i as i32],
                        note: None,
                    };
                    let data = service.to_data(&order).unwrap();
                    let decoded = service.to_object_as::<Order>(&data).unwrap().unwrap();
                    assert_eq!(decoded, order);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
