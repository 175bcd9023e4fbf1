use std::sync::Arc;

use zarrs_engine::array::codec::{
    ArrayToArrayCodecTraits, BytesCodec, BytesToBytesCodecTraits, ShardingCodecBuilder,
    TransposeCodec, TransposeOrder,
};
use zarrs_engine::array::data_type::NumpyTimeUnit;
use zarrs_engine::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs_engine::array_subset::ArraySubset;
use zarrs_engine::storage::store::MemoryStore;

fn data_types() -> Vec<DataType> {
    vec![
        DataType::Bool,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::UInt8,
        DataType::UInt16,
        DataType::UInt32,
        DataType::UInt64,
        DataType::Float16,
        DataType::Float32,
        DataType::Float64,
        DataType::Complex64,
        DataType::Complex128,
        DataType::NullTerminatedBytes(5),
        DataType::FixedLengthUtf32(8),
        DataType::NumpyDateTime64 {
            unit: NumpyTimeUnit::Second,
            scale_factor: 1,
        },
        DataType::NumpyTimeDelta64 {
            unit: NumpyTimeUnit::Millisecond,
            scale_factor: 10,
        },
    ]
}

/// Codec stages of an array: array to array, array to bytes, bytes to bytes.
type Codecs = (
    Vec<Box<dyn ArrayToArrayCodecTraits>>,
    Box<dyn zarrs_engine::array::codec::ArrayToBytesCodecTraits>,
    Vec<Box<dyn BytesToBytesCodecTraits>>,
);

fn codec_chains() -> Vec<(&'static str, Codecs)> {
    let transpose = || -> Box<dyn ArrayToArrayCodecTraits> {
        Box::new(TransposeCodec::new(TransposeOrder::new(&[1, 0]).unwrap()))
    };
    let mut chains: Vec<(&'static str, Codecs)> = vec![
        ("bytes", (vec![], Box::new(BytesCodec::little()), vec![])),
        ("bytes_big", (vec![], Box::new(BytesCodec::big()), vec![])),
        ("transpose", (vec![transpose()], Box::new(BytesCodec::little()), vec![])),
    ];
    #[cfg(feature = "gzip")]
    chains.push((
        "gzip",
        (
            vec![],
            Box::new(BytesCodec::little()),
            vec![Box::new(zarrs_engine::array::codec::GzipCodec::new(5).unwrap())],
        ),
    ));
    #[cfg(feature = "zstd")]
    chains.push((
        "zstd",
        (
            vec![],
            Box::new(BytesCodec::little()),
            vec![Box::new(zarrs_engine::array::codec::ZstdCodec::new(3, true))],
        ),
    ));
    #[cfg(feature = "crc32c")]
    {
        chains.push((
            "crc32c",
            (
                vec![],
                Box::new(BytesCodec::little()),
                vec![Box::new(zarrs_engine::array::codec::Crc32cCodec::new())],
            ),
        ));
        let mut sharding = ShardingCodecBuilder::new(vec![2, 3].try_into().unwrap());
        sharding.bytes_to_bytes_codecs(vec![Box::new(
            zarrs_engine::array::codec::Crc32cCodec::new(),
        )]);
        chains.push(("sharding_crc32c", (vec![], Box::new(sharding.build()), vec![])));
    }
    let mut sharding = ShardingCodecBuilder::new(vec![2, 3].try_into().unwrap());
    sharding.array_to_array_codecs(vec![transpose()]);
    chains.push(("sharding_transpose", (vec![], Box::new(sharding.build()), vec![])));
    chains
}

/// Deterministic element bytes, valid for every data type.
fn element_bytes(data_type: &DataType, num_elements: usize) -> Vec<u8> {
    if data_type == &DataType::Bool {
        return (0..num_elements).map(|i| u8::from(i % 3 == 1)).collect();
    }
    (0..num_elements * data_type.size())
        .map(|i| (i * 31 % 251) as u8 + 1)
        .collect()
}

#[test]
fn round_trip_data_types_and_codecs() {
    let shape = vec![12, 10];
    let subset = ArraySubset::new_with_ranges(&[1..11, 2..9]);
    for data_type in data_types() {
        let size = data_type.size();
        let data = element_bytes(&data_type, subset.num_elements_usize());
        let mut expected = vec![0u8; 12 * 10 * size];
        for (i, indices) in subset.indices().into_iter().enumerate() {
            let offset = (indices[0] * 10 + indices[1]) as usize * size;
            expected[offset..offset + size].copy_from_slice(&data[i * size..(i + 1) * size]);
        }

        for (name, (array_to_array, array_to_bytes, bytes_to_bytes)) in codec_chains() {
            let store = Arc::new(MemoryStore::new());
            let mut array = ArrayBuilder::new(
                shape.clone(),
                data_type.clone(),
                vec![4, 6],
                FillValue::zero(size),
            )
            .array_to_array_codecs(array_to_array)
            .array_to_bytes_codec(array_to_bytes)
            .bytes_to_bytes_codecs(bytes_to_bytes)
            .build(store.clone(), "/array")
            .unwrap();
            array.store_metadata().unwrap();
            array.store_array_subset(&subset, &data).unwrap();
            array.flush().unwrap();
            let whole = ArraySubset::new_with_shape(shape.clone());
            assert_eq!(
                array.retrieve_array_subset(&whole).unwrap(),
                expected,
                "{data_type} {name}"
            );
            drop(array);

            let window = ArraySubset::new_with_ranges(&[3..12, 0..7]);
            let direct = Array::<MemoryStore>::open(store.clone(), "/array").unwrap();
            assert_eq!(direct.retrieve_array_subset(&subset).unwrap(), data, "{data_type} {name}");
            let prefetched = Array::<MemoryStore>::open(store, "/array").unwrap();
            prefetched.advise_read(&window).unwrap();
            assert_eq!(
                prefetched.retrieve_array_subset(&window).unwrap(),
                direct.retrieve_array_subset(&window).unwrap(),
                "{data_type} {name}"
            );
        }
    }
}
