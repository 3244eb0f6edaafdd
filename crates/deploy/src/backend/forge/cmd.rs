//! Command builder for `forge create`.

use std::path::Path;

use alloy_core::primitives::U256;

/// Builder for `forge create` arguments.
#[derive(Debug, Clone)]
pub struct ForgeCreateCmdBuilder {
    contract: String,
    rpc_url: String,
    private_key: String,
    root: Option<String>,
    value: Option<U256>,
    constructor_args: Vec<String>,
    extra_args: Vec<String>,
}

impl ForgeCreateCmdBuilder {
    /// Create a new builder for `contract` (a name or `path:Name`).
    pub fn new(
        contract: impl Into<String>,
        rpc_url: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            contract: contract.into(),
            rpc_url: rpc_url.into(),
            private_key: private_key.into(),
            root: None,
            value: None,
            constructor_args: Vec::new(),
            extra_args: Vec::new(),
        }
    }

    /// Set the Foundry project root.
    pub fn root(mut self, path: impl AsRef<Path>) -> Self {
        self.root = Some(path.as_ref().display().to_string());
        self
    }

    /// Set the value (wei) sent with the deployment.
    pub fn value(mut self, value: Option<U256>) -> Self {
        self.value = value;
        self
    }

    /// Set the constructor arguments.
    pub fn constructor_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.constructor_args
            .extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add extra arguments.
    pub fn extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Build the command as a vector of strings.
    pub fn build(self) -> Vec<String> {
        let mut cmd = vec![
            "create".to_string(),
            self.contract,
            "--rpc-url".to_string(),
            self.rpc_url,
            "--private-key".to_string(),
            self.private_key,
            "--broadcast".to_string(),
            "--json".to_string(),
        ];

        if let Some(root) = self.root {
            cmd.push("--root".to_string());
            cmd.push(root);
        }

        if let Some(value) = self.value {
            cmd.push("--value".to_string());
            cmd.push(value.to_string());
        }

        cmd.extend(self.extra_args);

        // `--constructor-args` is variadic and must come last.
        if !self.constructor_args.is_empty() {
            cmd.push("--constructor-args".to_string());
            cmd.extend(self.constructor_args);
        }

        cmd
    }
}
