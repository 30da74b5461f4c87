//! Wire codec: call/reply envelopes and remote references
//!
//! The transport ships a method selector, a positional argument list, and a
//! result, all as self-describing JSON. Remote references are records carrying
//! the literal marker field `__remote_ref__ = true`; everything else passes
//! through as plain values.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RmiError;

/// Separates service name from method name in a call selector.
pub const METHOD_SEP: char = '@';

/// Separates class name from object id in synthetic service names.
pub const OBJECT_SEP: char = '#';

/// Marker field identifying a remote-reference record on the wire.
pub const REMOTE_REF_MARKER: &str = "__remote_ref__";

/// Serializable descriptor of a bound remote object.
///
/// Pure data; equal iff all fields match. A reference stays valid for as long
/// as the registry that serves it runs; there is no distributed GC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteRef {
    #[serde(rename = "__remote_ref__")]
    marker: bool,
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub signature_hash: String,
}

impl RemoteRef {
    pub fn new(
        service_name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        signature_hash: impl Into<String>,
    ) -> Self {
        Self {
            marker: true,
            service_name: service_name.into(),
            host: host.into(),
            port,
            signature_hash: signature_hash.into(),
        }
    }

    /// HTTP endpoint of the registry serving this reference.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/rmi", self.host, self.port)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("remote reference serializes to a plain record")
    }

    /// Parse a wire value as a remote reference. Returns `None` for anything
    /// that is not a record with the marker field set.
    pub fn from_value(value: &Value) -> Option<RemoteRef> {
        if !is_remote_ref(value) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

/// True iff the value is a record with `__remote_ref__ = true`.
pub fn is_remote_ref(value: &Value) -> bool {
    value
        .get(REMOTE_REF_MARKER)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// One inbound call: `service@method` selector plus positional params.
/// `params[0]` is always the caller's interface signature hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub method: String,
    pub params: Vec<Value>,
}

/// Wire form of a dispatch failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    pub kind: String,
    pub message: String,
}

/// One response: either a result value (possibly null) or a fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Fault>,
}

impl ReplyEnvelope {
    pub fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn fault(fault: Fault) -> Self {
        Self {
            result: None,
            error: Some(fault),
        }
    }

    pub fn into_result(self) -> Result<Value, RmiError> {
        match self.error {
            Some(fault) => Err(RmiError::from_fault(fault)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Fail with BadArguments unless exactly `want` positional args are present.
pub fn expect_arity(method: &str, args: &[Value], want: usize) -> Result<(), RmiError> {
    if args.len() != want {
        return Err(RmiError::bad_arguments(
            method,
            format!("expected {} arguments, got {}", want, args.len()),
        ));
    }
    Ok(())
}

/// Decode positional argument `index` into `T`.
pub fn arg<T: DeserializeOwned>(method: &str, args: &[Value], index: usize) -> Result<T, RmiError> {
    let value = args
        .get(index)
        .ok_or_else(|| RmiError::bad_arguments(method, format!("missing argument {}", index)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| RmiError::bad_arguments(method, format!("argument {}: {}", index, e)))
}

/// Decode positional argument `index` as a remote reference.
pub fn arg_remote_ref(method: &str, args: &[Value], index: usize) -> Result<RemoteRef, RmiError> {
    let value = args
        .get(index)
        .ok_or_else(|| RmiError::bad_arguments(method, format!("missing argument {}", index)))?;
    RemoteRef::from_value(value).ok_or_else(|| {
        RmiError::bad_arguments(method, format!("argument {} is not a remote reference", index))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_ref_roundtrip() {
        let r = RemoteRef::new("SuccessCallbackImpl#7", "127.0.0.1", 29054, "abcd");
        let value = r.to_value();
        assert!(is_remote_ref(&value));
        assert_eq!(value["__remote_ref__"], json!(true));
        assert_eq!(value["service_name"], json!("SuccessCallbackImpl#7"));

        let back = RemoteRef::from_value(&value).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_plain_records_are_not_remote_refs() {
        assert!(!is_remote_ref(&json!({"service_name": "x"})));
        assert!(!is_remote_ref(&json!({"__remote_ref__": false})));
        assert!(!is_remote_ref(&json!(null)));
        assert!(!is_remote_ref(&json!([1, 2, 3])));
    }

    #[test]
    fn test_record_decode_encode_is_stable() {
        let wire = r#"{"amount":500,"card_number":"111111","note":null}"#;
        let value: Value = serde_json::from_str(wire).unwrap();
        let encoded = serde_json::to_value(&value).unwrap();
        assert_eq!(value, encoded);
        assert_eq!(encoded["note"], Value::Null);
    }

    #[test]
    fn test_reply_envelope_result() {
        let reply = ReplyEnvelope::ok(json!(1500));
        assert_eq!(reply.into_result().unwrap(), json!(1500));

        let reply = ReplyEnvelope::fault(Fault {
            kind: "domain".to_string(),
            message: "Số dư không đủ!".to_string(),
        });
        let err = reply.into_result().unwrap_err();
        assert!(err.is_fault_kind("domain"));
    }

    #[test]
    fn test_null_result_decodes_to_null() {
        let reply: ReplyEnvelope = serde_json::from_str("{}").unwrap();
        assert_eq!(reply.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_arg_helpers() {
        let args = vec![json!("111111"), json!(500), json!({"__remote_ref__": true,
            "service_name": "Cb#1", "host": "127.0.0.1", "port": 1, "signature_hash": "aa"})];
        let card: String = arg("deposit", &args, 0).unwrap();
        assert_eq!(card, "111111");
        let amount: i64 = arg("deposit", &args, 1).unwrap();
        assert_eq!(amount, 500);
        let r = arg_remote_ref("deposit", &args, 2).unwrap();
        assert_eq!(r.service_name, "Cb#1");

        assert!(expect_arity("deposit", &args, 3).is_ok());
        assert!(expect_arity("deposit", &args, 2).is_err());
        assert!(arg_remote_ref("deposit", &args, 1).is_err());
        let bad: Result<i64, _> = arg("deposit", &args, 0);
        assert!(bad.is_err());
    }
}
