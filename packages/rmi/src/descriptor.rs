//! Interface descriptors and signature hashing
//!
//! An interface is a named set of method declarations. Its signature hash is
//! computed over the interface name plus each method (in sorted order) with
//! its textual parameter list and return type. Method bodies are never
//! hashed. Two interfaces are compatible iff their digests match.

use std::sync::OnceLock;

use crate::hash::keccak_hex;

/// One method declaration: name, formal parameters, return type.
///
/// Parameters are textual `name: type` entries; the exact spelling is part of
/// the signature, so both sides must share the same descriptor definition.
#[derive(Debug)]
pub struct MethodSig {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub returns: &'static str,
}

/// A named interface with its method set and a cached signature hash.
#[derive(Debug)]
pub struct InterfaceDescriptor {
    pub name: &'static str,
    pub methods: &'static [MethodSig],
    hash: OnceLock<String>,
}

impl InterfaceDescriptor {
    pub const fn new(name: &'static str, methods: &'static [MethodSig]) -> Self {
        Self {
            name,
            methods,
            hash: OnceLock::new(),
        }
    }

    /// Hex digest of the interface signature. Computed once, then cached.
    pub fn signature_hash(&self) -> &str {
        self.hash.get_or_init(|| {
            let mut input = Vec::new();
            input.extend_from_slice(self.name.as_bytes());

            let mut names: Vec<&MethodSig> = self.methods.iter().collect();
            names.sort_by_key(|m| m.name);

            for method in names {
                input.extend_from_slice(method.name.as_bytes());
                input.push(b'(');
                for (i, param) in method.params.iter().enumerate() {
                    if i > 0 {
                        input.push(b',');
                    }
                    input.extend_from_slice(param.as_bytes());
                }
                input.extend_from_slice(b")->");
                input.extend_from_slice(method.returns.as_bytes());
            }

            keccak_hex(&input)
        })
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodSig> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static PING: InterfaceDescriptor = InterfaceDescriptor::new(
        "PingCallback",
        &[MethodSig {
            name: "ping",
            params: &["timestamp: int"],
            returns: "int",
        }],
    );

    static PING_COPY: InterfaceDescriptor = InterfaceDescriptor::new(
        "PingCallback",
        &[MethodSig {
            name: "ping",
            params: &["timestamp: int"],
            returns: "int",
        }],
    );

    static PING_WIDER: InterfaceDescriptor = InterfaceDescriptor::new(
        "PingCallback",
        &[MethodSig {
            name: "ping",
            params: &["timestamp: int", "label: string"],
            returns: "int",
        }],
    );

    static AB: InterfaceDescriptor = InterfaceDescriptor::new(
        "Svc",
        &[
            MethodSig {
                name: "a",
                params: &[],
                returns: "null",
            },
            MethodSig {
                name: "b",
                params: &[],
                returns: "null",
            },
        ],
    );

    static BA: InterfaceDescriptor = InterfaceDescriptor::new(
        "Svc",
        &[
            MethodSig {
                name: "b",
                params: &[],
                returns: "null",
            },
            MethodSig {
                name: "a",
                params: &[],
                returns: "null",
            },
        ],
    );

    #[test]
    fn test_identical_interfaces_match() {
        assert_eq!(PING.signature_hash(), PING_COPY.signature_hash());
    }

    #[test]
    fn test_extra_parameter_changes_hash() {
        assert_ne!(PING.signature_hash(), PING_WIDER.signature_hash());
    }

    #[test]
    fn test_method_declaration_order_is_irrelevant() {
        assert_eq!(AB.signature_hash(), BA.signature_hash());
    }

    #[test]
    fn test_hash_is_cached() {
        let first = PING.signature_hash() as *const str;
        let second = PING.signature_hash() as *const str;
        assert_eq!(first, second);
    }

    #[test]
    fn test_method_lookup() {
        assert!(PING.has_method("ping"));
        assert!(!PING.has_method("pong"));
        assert_eq!(PING.method("ping").unwrap().params.len(), 1);
    }
}
