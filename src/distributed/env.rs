//! Snapshot of the launch environment
//!
//! The process environment is read once at the binary boundary. Library code
//! takes a `LaunchEnv` by reference instead of calling `std::env::var`, and
//! nothing in the crate writes to the process environment.

use std::collections::BTreeMap;

pub const WORLD_SIZE: &str = "WORLD_SIZE";
pub const RANK: &str = "RANK";
pub const LOCAL_RANK: &str = "LOCAL_RANK";
pub const CUDA_VISIBLE_DEVICES: &str = "CUDA_VISIBLE_DEVICES";
pub const CUDA_LAUNCH_BLOCKING: &str = "CUDA_LAUNCH_BLOCKING";
pub const HUGGINGFACE_TOKEN: &str = "HUGGINGFACE_TOKEN";
pub const HF_TOKEN: &str = "HF_TOKEN";

/// Variables captured by [`LaunchEnv::from_env`]
const CAPTURED_VARS: &[&str] = &[WORLD_SIZE, CUDA_VISIBLE_DEVICES, HUGGINGFACE_TOKEN, HF_TOKEN];

/// Immutable view of the environment variables this tool consumes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchEnv {
    vars: BTreeMap<String, String>,
}

impl LaunchEnv {
    /// Capture the known variables from the current process
    pub fn from_env() -> Self {
        let vars = CAPTURED_VARS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();
        Self { vars }
    }

    /// Build a snapshot from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn world_size(&self) -> Option<&str> {
        self.get(WORLD_SIZE)
    }

    pub fn cuda_visible_devices(&self) -> Option<&str> {
        self.get(CUDA_VISIBLE_DEVICES)
    }

    /// Hugging Face token, preferring `HUGGINGFACE_TOKEN` over `HF_TOKEN`.
    /// Blank values count as unset.
    pub fn hf_token(&self) -> Option<&str> {
        [HUGGINGFACE_TOKEN, HF_TOKEN]
            .into_iter()
            .filter_map(|key| self.get(key))
            .map(str::trim)
            .find(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_lookup() {
        let env = LaunchEnv::from_pairs([(WORLD_SIZE, "4"), (CUDA_VISIBLE_DEVICES, "0,1")]);
        assert_eq!(env.world_size(), Some("4"));
        assert_eq!(env.cuda_visible_devices(), Some("0,1"));
        assert_eq!(env.get(RANK), None);
    }

    #[test]
    fn test_rank_variables_are_only_written() {
        // RANK and LOCAL_RANK go to children, never come from the parent
        assert!(!CAPTURED_VARS.contains(&RANK));
        assert!(!CAPTURED_VARS.contains(&LOCAL_RANK));
        assert!(CAPTURED_VARS.contains(&WORLD_SIZE));
    }

    #[test]
    fn test_hf_token_precedence() {
        let env = LaunchEnv::from_pairs([(HUGGINGFACE_TOKEN, "hf_a"), (HF_TOKEN, "hf_b")]);
        assert_eq!(env.hf_token(), Some("hf_a"));

        let env = LaunchEnv::from_pairs([(HUGGINGFACE_TOKEN, "  "), (HF_TOKEN, "hf_b")]);
        assert_eq!(env.hf_token(), Some("hf_b"));

        assert_eq!(LaunchEnv::default().hf_token(), None);
    }
}
