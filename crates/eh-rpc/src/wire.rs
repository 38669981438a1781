//! Inner RPC frame: `innerType:u8 | req:u32 | …type-specific body…`,
//! carried inside a [`eh_protocol::PersistentProtocol`] `Regular`
//! message's payload (§6). This is a second, independent framing layer
//! from the outer L1/L2 header — nothing here touches the outer `id`/
//! `ack`, which belong to the reliability layer alone.

use bytes::Bytes;
use serde_json::Value;

use crate::args::{
    BufferValue, RemoteError, RpcArg, UriTransform, decode_buffer_value, encode_buffer_value,
    transform_json_incoming, transform_json_outgoing,
};
use crate::buffer::{MessageBufferReader, MessageBufferWriter};
use crate::error::RpcError;

/// Discriminant for the inner frame's `innerType` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InnerType {
    RequestJsonArgs,
    RequestJsonArgsWithCancellation,
    RequestMixedArgs,
    RequestMixedArgsWithCancellation,
    Acknowledged,
    Cancel,
    ReplyOkEmpty,
    ReplyOkBuffer,
    ReplyOkJson,
    ReplyOkJsonWithBuffers,
    ReplyErrError,
    ReplyErrEmpty,
}

impl InnerType {
    const REQUEST_JSON_ARGS: u8 = 1;
    const REQUEST_JSON_ARGS_WITH_CANCELLATION: u8 = 2;
    const REQUEST_MIXED_ARGS: u8 = 3;
    const REQUEST_MIXED_ARGS_WITH_CANCELLATION: u8 = 4;
    const ACKNOWLEDGED: u8 = 5;
    const CANCEL: u8 = 6;
    const REPLY_OK_EMPTY: u8 = 7;
    const REPLY_OK_BUFFER: u8 = 8;
    const REPLY_OK_JSON: u8 = 9;
    const REPLY_OK_JSON_WITH_BUFFERS: u8 = 10;
    const REPLY_ERR_ERROR: u8 = 11;
    const REPLY_ERR_EMPTY: u8 = 12;

    fn to_u8(self) -> u8 {
        match self {
            Self::RequestJsonArgs => Self::REQUEST_JSON_ARGS,
            Self::RequestJsonArgsWithCancellation => Self::REQUEST_JSON_ARGS_WITH_CANCELLATION,
            Self::RequestMixedArgs => Self::REQUEST_MIXED_ARGS,
            Self::RequestMixedArgsWithCancellation => Self::REQUEST_MIXED_ARGS_WITH_CANCELLATION,
            Self::Acknowledged => Self::ACKNOWLEDGED,
            Self::Cancel => Self::CANCEL,
            Self::ReplyOkEmpty => Self::REPLY_OK_EMPTY,
            Self::ReplyOkBuffer => Self::REPLY_OK_BUFFER,
            Self::ReplyOkJson => Self::REPLY_OK_JSON,
            Self::ReplyOkJsonWithBuffers => Self::REPLY_OK_JSON_WITH_BUFFERS,
            Self::ReplyErrError => Self::REPLY_ERR_ERROR,
            Self::ReplyErrEmpty => Self::REPLY_ERR_EMPTY,
        }
    }

    fn from_u8(b: u8) -> Result<Self, RpcError> {
        Ok(match b {
            Self::REQUEST_JSON_ARGS => Self::RequestJsonArgs,
            Self::REQUEST_JSON_ARGS_WITH_CANCELLATION => Self::RequestJsonArgsWithCancellation,
            Self::REQUEST_MIXED_ARGS => Self::RequestMixedArgs,
            Self::REQUEST_MIXED_ARGS_WITH_CANCELLATION => Self::RequestMixedArgsWithCancellation,
            Self::ACKNOWLEDGED => Self::Acknowledged,
            Self::CANCEL => Self::Cancel,
            Self::REPLY_OK_EMPTY => Self::ReplyOkEmpty,
            Self::REPLY_OK_BUFFER => Self::ReplyOkBuffer,
            Self::REPLY_OK_JSON => Self::ReplyOkJson,
            Self::REPLY_OK_JSON_WITH_BUFFERS => Self::ReplyOkJsonWithBuffers,
            Self::REPLY_ERR_ERROR => Self::ReplyErrError,
            Self::REPLY_ERR_EMPTY => Self::ReplyErrEmpty,
            other => return Err(RpcError::MalformedFrame(malformed_inner_type(other))),
        })
    }
}

fn malformed_inner_type(_b: u8) -> &'static str {
    "unrecognized inner RPC message type"
}

/// One inner RPC-layer message: a request, a reply, an ack, or a cancel.
#[derive(Debug, Clone)]
pub enum InnerMessage {
    Request {
        req: u32,
        rpc_id: u8,
        method: String,
        args: Vec<RpcArg>,
        with_cancellation: bool,
    },
    Acknowledged {
        req: u32,
    },
    Cancel {
        req: u32,
    },
    ReplyOkEmpty {
        req: u32,
    },
    ReplyOkBuffer {
        req: u32,
        buffer: Bytes,
    },
    ReplyOkJson {
        req: u32,
        value: Value,
    },
    ReplyOkJsonWithBuffers {
        req: u32,
        value: BufferValue,
    },
    ReplyErrError {
        req: u32,
        error: RemoteError,
    },
    ReplyErrEmpty {
        req: u32,
    },
}

impl InnerMessage {
    #[must_use]
    pub fn req(&self) -> u32 {
        match self {
            Self::Request { req, .. }
            | Self::Acknowledged { req }
            | Self::Cancel { req }
            | Self::ReplyOkEmpty { req }
            | Self::ReplyOkBuffer { req, .. }
            | Self::ReplyOkJson { req, .. }
            | Self::ReplyOkJsonWithBuffers { req, .. }
            | Self::ReplyErrError { req, .. }
            | Self::ReplyErrEmpty { req } => *req,
        }
    }

    /// Encode into the inner frame's byte representation, applying the
    /// outgoing URI transform (if any) during the same walk that
    /// extracts out-of-band buffers. Method names are written with a
    /// leading `$`, stripped again on decode — a wire-compatibility
    /// convention of this format's method-name encoding (see DESIGN.md).
    pub fn encode(&self, transform: Option<&dyn UriTransform>) -> Result<Bytes, RpcError> {
        let mut w = MessageBufferWriter::new();
        match self {
            Self::Request { req, rpc_id, method, args, with_cancellation } => {
                let mixed = crate::args::requires_mixed_encoding(args);
                let kind = match (mixed, with_cancellation) {
                    (false, false) => InnerType::RequestJsonArgs,
                    (false, true) => InnerType::RequestJsonArgsWithCancellation,
                    (true, false) => InnerType::RequestMixedArgs,
                    (true, true) => InnerType::RequestMixedArgsWithCancellation,
                };
                w.write_u8(kind.to_u8()).write_u32(*req);
                w.write_u8(*rpc_id).write_short_string(&format!("${method}"));
                if mixed {
                    write_mixed_array(&mut w, args, transform)?;
                } else {
                    let values: Vec<Value> = args
                        .iter()
                        .map(|a| match a {
                            RpcArg::Value(v) => transform_json_outgoing(None, v, transform),
                            _ => unreachable!("requires_mixed_encoding would have selected the mixed path"),
                        })
                        .collect();
                    w.write_long_string(&serde_json::to_string(&values)?);
                }
            }
            Self::Acknowledged { req } => {
                w.write_u8(InnerType::Acknowledged.to_u8()).write_u32(*req);
            }
            Self::Cancel { req } => {
                w.write_u8(InnerType::Cancel.to_u8()).write_u32(*req);
            }
            Self::ReplyOkEmpty { req } => {
                w.write_u8(InnerType::ReplyOkEmpty.to_u8()).write_u32(*req);
            }
            Self::ReplyOkBuffer { req, buffer } => {
                w.write_u8(InnerType::ReplyOkBuffer.to_u8()).write_u32(*req);
                w.write_buffer(buffer);
            }
            Self::ReplyOkJson { req, value } => {
                w.write_u8(InnerType::ReplyOkJson.to_u8()).write_u32(*req);
                let transformed = transform_json_outgoing(None, value, transform);
                w.write_long_string(&serde_json::to_string(&transformed)?);
            }
            Self::ReplyOkJsonWithBuffers { req, value } => {
                w.write_u8(InnerType::ReplyOkJsonWithBuffers.to_u8()).write_u32(*req);
                let mut buffers = Vec::new();
                let json = encode_buffer_value(value, &mut buffers, transform);
                w.write_u32(buffers.len() as u32);
                w.write_long_string(&serde_json::to_string(&json)?);
                for buf in &buffers {
                    w.write_buffer(buf);
                }
            }
            Self::ReplyErrError { req, error } => {
                w.write_u8(InnerType::ReplyErrError.to_u8()).write_u32(*req);
                w.write_long_string(&serde_json::to_string(&error.to_json())?);
            }
            Self::ReplyErrEmpty { req } => {
                w.write_u8(InnerType::ReplyErrEmpty.to_u8()).write_u32(*req);
            }
        }
        Ok(w.finish())
    }

    pub fn decode(bytes: Bytes, transform: Option<&dyn UriTransform>) -> Result<Self, RpcError> {
        let mut r = MessageBufferReader::new(bytes);
        let kind = InnerType::from_u8(r.read_u8()?)?;
        let req = r.read_u32()?;
        Ok(match kind {
            InnerType::RequestJsonArgs | InnerType::RequestJsonArgsWithCancellation => {
                let rpc_id = r.read_u8()?;
                let method = strip_dollar(r.read_short_string()?);
                let json_args = r.read_long_string()?;
                let values: Vec<Value> = serde_json::from_str(&json_args)?;
                Self::Request {
                    req,
                    rpc_id,
                    method,
                    args: values
                        .into_iter()
                        .map(|v| RpcArg::Value(transform_json_incoming(None, &v, transform)))
                        .collect(),
                    with_cancellation: kind == InnerType::RequestJsonArgsWithCancellation,
                }
            }
            InnerType::RequestMixedArgs | InnerType::RequestMixedArgsWithCancellation => {
                let rpc_id = r.read_u8()?;
                let method = strip_dollar(r.read_short_string()?);
                let args = read_mixed_array(&mut r, transform)?;
                Self::Request {
                    req,
                    rpc_id,
                    method,
                    args,
                    with_cancellation: kind == InnerType::RequestMixedArgsWithCancellation,
                }
            }
            InnerType::Acknowledged => Self::Acknowledged { req },
            InnerType::Cancel => Self::Cancel { req },
            InnerType::ReplyOkEmpty => Self::ReplyOkEmpty { req },
            InnerType::ReplyOkBuffer => Self::ReplyOkBuffer { req, buffer: r.read_buffer()? },
            InnerType::ReplyOkJson => {
                let json = r.read_long_string()?;
                let value: Value = serde_json::from_str(&json)?;
                Self::ReplyOkJson { req, value: transform_json_incoming(None, &value, transform) }
            }
            InnerType::ReplyOkJsonWithBuffers => {
                let buf_count = r.read_u32()? as usize;
                let json = r.read_long_string()?;
                let mut buffers = Vec::with_capacity(buf_count);
                for _ in 0..buf_count {
                    buffers.push(r.read_buffer()?);
                }
                let value: Value = serde_json::from_str(&json)?;
                Self::ReplyOkJsonWithBuffers { req, value: decode_buffer_value(&value, &buffers, transform)? }
            }
            InnerType::ReplyErrError => {
                let json = r.read_long_string()?;
                let value: Value = serde_json::from_str(&json)?;
                let error = RemoteError::from_json(&value).unwrap_or(RemoteError {
                    name: "Error".to_owned(),
                    message: "unknown error".to_owned(),
                    stack: String::new(),
                });
                Self::ReplyErrError { req, error }
            }
            InnerType::ReplyErrEmpty => Self::ReplyErrEmpty { req },
        })
    }
}

fn strip_dollar(method: String) -> String {
    method.strip_prefix('$').map(str::to_owned).unwrap_or(method)
}

/// `argType` discriminants for `mixedArray` atoms (§6).
const ARG_TYPE_STRING: u8 = 1;
const ARG_TYPE_BUFFER: u8 = 2;
const ARG_TYPE_SERIALIZED_WITH_BUFFERS: u8 = 3;
const ARG_TYPE_UNDEFINED: u8 = 4;

fn write_mixed_array(
    w: &mut MessageBufferWriter,
    args: &[RpcArg],
    transform: Option<&dyn UriTransform>,
) -> Result<(), RpcError> {
    debug_assert!(args.len() <= u8::MAX as usize, "mixed array count exceeds u8 range");
    w.write_u8(args.len() as u8);
    for arg in args {
        match arg {
            RpcArg::Value(v) => {
                w.write_u8(ARG_TYPE_STRING);
                let transformed = transform_json_outgoing(None, v, transform);
                w.write_long_string(&serde_json::to_string(&transformed)?);
            }
            RpcArg::Buffer(b) => {
                w.write_u8(ARG_TYPE_BUFFER);
                w.write_buffer(b);
            }
            RpcArg::WithBuffers(bv) => {
                w.write_u8(ARG_TYPE_SERIALIZED_WITH_BUFFERS);
                let mut buffers = Vec::new();
                let json = encode_buffer_value(bv, &mut buffers, transform);
                w.write_u32(buffers.len() as u32);
                w.write_long_string(&serde_json::to_string(&json)?);
                for buf in &buffers {
                    w.write_buffer(buf);
                }
            }
            RpcArg::Undefined => {
                w.write_u8(ARG_TYPE_UNDEFINED);
            }
        }
    }
    Ok(())
}

fn read_mixed_array(r: &mut MessageBufferReader, transform: Option<&dyn UriTransform>) -> Result<Vec<RpcArg>, RpcError> {
    let count = r.read_u8()? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let arg_type = r.read_u8()?;
        out.push(match arg_type {
            ARG_TYPE_STRING => {
                let json = r.read_long_string()?;
                let value: Value = serde_json::from_str(&json)?;
                RpcArg::Value(transform_json_incoming(None, &value, transform))
            }
            ARG_TYPE_BUFFER => RpcArg::Buffer(r.read_buffer()?),
            ARG_TYPE_SERIALIZED_WITH_BUFFERS => {
                let buf_count = r.read_u32()? as usize;
                let json = r.read_long_string()?;
                let mut buffers = Vec::with_capacity(buf_count);
                for _ in 0..buf_count {
                    buffers.push(r.read_buffer()?);
                }
                let value: Value = serde_json::from_str(&json)?;
                RpcArg::WithBuffers(decode_buffer_value(&value, &buffers, transform)?)
            }
            ARG_TYPE_UNDEFINED => RpcArg::Undefined,
            _ => return Err(RpcError::MalformedFrame("unrecognized mixedArray argType")),
        });
    }
    Ok(out)
}
