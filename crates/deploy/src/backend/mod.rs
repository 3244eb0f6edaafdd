//! Deployment backends: the only place where transactions leave the process.

pub mod forge;

use std::{fmt, future::Future};

use alloy_core::primitives::{Address, U256};
use serde::Serialize;
use serde_json::Value;

use crate::Artifact;

pub use forge::{ForgeBackend, ForgeConfig, ForgeCreateCmdBuilder};

/// A constructor argument after resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeployArg {
    /// A literal value, exactly as declared.
    Literal(Value),
    /// The address of a deployed action or an address-book entry.
    Address(Address),
}

impl fmt::Display for DeployArg {
    /// Renders the argument the way Foundry's CLI expects it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(Value::String(s)) => f.write_str(s),
            Self::Literal(value) => write_cli_value(f, value),
            Self::Address(address) => write!(f, "{address}"),
        }
    }
}

/// Strings nested in arrays are quoted and escaped, so a `,` inside an item
/// does not split it.
fn write_cli_value(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Array(items) => {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write_cli_value(f, item)?;
            }
            f.write_str("]")
        }
        other => write!(f, "{other}"),
    }
}

/// Performs the actual network submission of a contract deployment.
///
/// Implementations own signing, nonce handling, transport and confirmation.
/// The engine awaits each call before starting the next one.
pub trait DeploymentBackend: Send + Sync {
    /// Deploy `artifact` with the resolved constructor `args`, returning the
    /// address of the new contract.
    fn deploy(
        &self,
        artifact: &Artifact,
        args: &[DeployArg],
        value: Option<U256>,
    ) -> impl Future<Output = anyhow::Result<Address>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cli_rendering() {
        assert_eq!(DeployArg::Literal(json!(42)).to_string(), "42");
        assert_eq!(DeployArg::Literal(json!("x")).to_string(), "x");
        assert_eq!(DeployArg::Literal(json!(true)).to_string(), "true");
        assert_eq!(
            DeployArg::Literal(json!([1, "two", [3]])).to_string(),
            "[1,\"two\",[3]]"
        );
        assert_eq!(
            DeployArg::Literal(json!(["a,b", "c"])).to_string(),
            r#"["a,b","c"]"#,
            "A comma inside an array item must not split it"
        );
        assert_eq!(
            DeployArg::Literal(json!([["say \"hi\""]])).to_string(),
            r#"[["say \"hi\""]]"#
        );
        assert_eq!(DeployArg::Literal(json!("a,b")).to_string(), "a,b");
        assert_eq!(
            DeployArg::Address(Address::with_last_byte(1)).to_string(),
            "0x0000000000000000000000000000000000000001"
        );
    }
}
