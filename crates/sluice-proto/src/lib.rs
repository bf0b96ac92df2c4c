#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

/// v0 wire records, written by hand against stable external field layouts
/// rather than generated from `.proto` sources.
///
/// `Summary`/`SummaryValue`/`HistogramRecord` keep the TensorBoard
/// `Summary`/`HistogramProto` tag numbers so serialized summaries are
/// readable by existing visualization tooling. `TensorRecord` keeps the
/// tag numbers of the ONNX `TensorProto` subset that shard files carry.
pub mod v0 {
    /// Histogram export record (TensorBoard `HistogramProto` layout).
    ///
    /// `bucket_limit[i]` is the inclusive upper edge of bucket `i`;
    /// `bucket[i]` is its count. The two lists are always the same length.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct HistogramRecord {
        #[prost(double, tag = "1")]
        pub min: f64,
        #[prost(double, tag = "2")]
        pub max: f64,
        #[prost(double, tag = "3")]
        pub num: f64,
        #[prost(double, tag = "4")]
        pub sum: f64,
        #[prost(double, tag = "5")]
        pub sum_squares: f64,
        #[prost(double, repeated, tag = "6")]
        pub bucket_limit: ::prost::alloc::vec::Vec<f64>,
        #[prost(double, repeated, tag = "7")]
        pub bucket: ::prost::alloc::vec::Vec<f64>,
    }

    /// A set of tagged values produced by one summary op (or a merge of several).
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Summary {
        #[prost(message, repeated, tag = "1")]
        pub value: ::prost::alloc::vec::Vec<SummaryValue>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SummaryValue {
        #[prost(string, tag = "1")]
        pub tag: ::prost::alloc::string::String,
        #[prost(oneof = "summary_value::Payload", tags = "2, 5, 8")]
        pub payload: ::core::option::Option<summary_value::Payload>,
    }

    pub mod summary_value {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Payload {
            #[prost(float, tag = "2")]
            SimpleValue(f32),
            #[prost(message, tag = "5")]
            Histo(super::HistogramRecord),
            #[prost(string, tag = "8")]
            Text(::prost::alloc::string::String),
        }
    }

    /// One named tensor as framed inside a shard file (ONNX `TensorProto` subset).
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TensorRecord {
        #[prost(int64, repeated, tag = "1")]
        pub dims: ::prost::alloc::vec::Vec<i64>,
        #[prost(int32, tag = "2")]
        pub data_type: i32,
        #[prost(float, repeated, tag = "4")]
        pub float_data: ::prost::alloc::vec::Vec<f32>,
        #[prost(int64, repeated, tag = "7")]
        pub int64_data: ::prost::alloc::vec::Vec<i64>,
        #[prost(string, tag = "8")]
        pub name: ::prost::alloc::string::String,
        #[prost(bytes = "vec", tag = "9")]
        pub raw_data: ::prost::alloc::vec::Vec<u8>,
    }

    pub const DATA_TYPE_UNDEFINED: i32 = 0;
    pub const DATA_TYPE_FLOAT: i32 = 1;
    pub const DATA_TYPE_INT64: i32 = 7;
}
