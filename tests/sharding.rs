use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use zarrs_engine::array::codec::{
    BytesToBytesCodecTraits, CodecError, CodecTraits, ShardingCodecBuilder,
};
use zarrs_engine::array::{Array, ArrayBuilder, BytesRepresentation, DataType, FillValue};
use zarrs_engine::array_subset::ArraySubset;
use zarrs_engine::metadata::Metadata;
use zarrs_engine::storage::store::MemoryStore;
use zarrs_engine::storage::{ReadableStorageTraits, StoreKey};

/// A bytes to bytes codec counting the values it encodes, failing to encode while `fail` is set.
#[derive(Clone, Debug, Default)]
struct CountingCodec {
    count: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl CountingCodec {
    fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl CodecTraits for CountingCodec {
    fn create_metadata(&self) -> Option<Metadata> {
        None
    }
}

impl BytesToBytesCodecTraits for CountingCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        *decoded_representation
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CodecError::Other("encoding disabled".to_string()));
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(decoded_value)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        _decoded_representation: &BytesRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        Ok(encoded_value)
    }
}

/// An 8x8 `uint16` array with 4x8 shards of 2x2 inner chunks.
fn sharded_array(store: &Arc<MemoryStore>, counter: &CountingCodec) -> Array<MemoryStore> {
    let mut array = ArrayBuilder::new(vec![8, 8], DataType::UInt16, vec![4, 8], FillValue::from(0u16))
        .array_to_bytes_codec(Box::new(
            ShardingCodecBuilder::new(vec![2, 2].try_into().unwrap()).build(),
        ))
        .bytes_to_bytes_codecs(vec![Box::new(counter.clone())])
        .build(store.clone(), "/array")
        .unwrap();
    array.store_metadata().unwrap();
    array
}

fn inner_chunk(index: u64) -> Vec<u8> {
    (0..4u16)
        .flat_map(|i| (index as u16 * 10 + i + 1).to_ne_bytes())
        .collect()
}

fn block_indices(index: u64) -> Vec<u64> {
    vec![index / 4, index % 4]
}

#[test]
fn sharding_write_order_independent() {
    let in_order = Arc::new(MemoryStore::new());
    let counter_in_order = CountingCodec::default();
    let mut array = sharded_array(&in_order, &counter_in_order);
    assert!(array.is_sharded());
    assert_eq!(array.inner_chunk_shape().to_array_shape(), vec![2, 2]);
    for index in 0..16 {
        array.store_chunk(&block_indices(index), inner_chunk(index)).unwrap();
    }
    array.flush().unwrap();
    assert_eq!(counter_in_order.count(), 2);

    let shuffled = Arc::new(MemoryStore::new());
    let counter_shuffled = CountingCodec::default();
    let mut array = sharded_array(&shuffled, &counter_shuffled);
    for index in (0..16).map(|i| (i * 7) % 16) {
        array.store_chunk(&block_indices(index), inner_chunk(index)).unwrap();
    }
    array.flush().unwrap();
    assert_eq!(counter_shuffled.count(), 2);

    for shard in ["array/c/0/0", "array/c/1/0"] {
        let key = StoreKey::new(shard).unwrap();
        let expected = in_order.get(&key).unwrap().unwrap();
        assert_eq!(shuffled.get(&key).unwrap().unwrap(), expected, "{shard}");
    }

    let array = Array::<MemoryStore>::open(shuffled, "/array").unwrap();
    for index in 0..16 {
        assert_eq!(array.retrieve_chunk(&block_indices(index)).unwrap(), inner_chunk(index));
    }
}

#[test]
fn sharding_partial_shard_flush() {
    let store = Arc::new(MemoryStore::new());
    let counter = CountingCodec::default();
    let mut array = sharded_array(&store, &counter);
    for index in [0, 5, 2] {
        array.store_chunk(&block_indices(index), inner_chunk(index)).unwrap();
    }
    array.flush().unwrap();
    assert_eq!(counter.count(), 1);
    assert!(store.get(&StoreKey::new("array/c/1/0").unwrap()).unwrap().is_none());

    array.store_chunk(&block_indices(7), inner_chunk(7)).unwrap();
    array.store_chunk(&block_indices(0), vec![0; 8]).unwrap();
    array.flush().unwrap();
    assert_eq!(counter.count(), 2);

    let array = Array::<MemoryStore>::open(store, "/array").unwrap();
    for index in 0..8 {
        let expected = if [2, 5, 7].contains(&index) {
            inner_chunk(index)
        } else {
            vec![0; 8]
        };
        assert_eq!(array.retrieve_chunk(&block_indices(index)).unwrap(), expected, "{index}");
    }
}

#[test]
fn sharding_bulk_write_and_prefetch() {
    let store = Arc::new(MemoryStore::new());
    let counter = CountingCodec::default();
    let mut array = sharded_array(&store, &counter);
    let elements: Vec<u16> = (0..64).collect();
    array
        .store_array_subset_elements(&ArraySubset::new_with_shape(vec![8, 8]), &elements)
        .unwrap();
    assert_eq!(counter.count(), 2);
    array.flush().unwrap();
    assert_eq!(counter.count(), 2);

    let array = Array::<MemoryStore>::open(store, "/array").unwrap();
    let subset = ArraySubset::new_with_ranges(&[1..7, 3..8]);
    array.advise_read(&subset).unwrap();
    let expected: Vec<u16> = (1..7)
        .flat_map(|row| (3..8).map(move |column| row * 8 + column))
        .collect();
    assert_eq!(
        array.retrieve_array_subset_elements::<u16>(&subset).unwrap(),
        expected
    );
}

#[test]
fn sharding_failed_shard_write_keeps_buffered_blocks() {
    let store = Arc::new(MemoryStore::new());
    let counter = CountingCodec::default();
    let mut array = sharded_array(&store, &counter);
    for index in 0..8 {
        array.store_chunk(&block_indices(index), inner_chunk(index)).unwrap();
    }
    counter.set_fail(true);
    assert!(array.flush().is_err());
    assert!(store.get(&StoreKey::new("array/c/0/0").unwrap()).unwrap().is_none());
    for index in 0..8 {
        assert_eq!(array.retrieve_chunk(&block_indices(index)).unwrap(), inner_chunk(index), "{index}");
    }

    counter.set_fail(false);
    array.flush().unwrap();
    assert_eq!(counter.count(), 1);
    let array = Array::<MemoryStore>::open(store, "/array").unwrap();
    for index in 0..8 {
        assert_eq!(array.retrieve_chunk(&block_indices(index)).unwrap(), inner_chunk(index), "{index}");
    }
}
