//! Runtime bootstrap: environment variables injected by the Node wrapper
//! before the binary starts.

use std::collections::BTreeMap;

pub const BOOTSTRAP_FILE: &str = "env.js";

/// One `process.env` assignment per entry. Keys and values are emitted as
/// JSON string literals, which JavaScript accepts verbatim.
pub fn render_env_script(env: &BTreeMap<String, String>) -> String {
    let mut script = String::from("'use strict';\n\n");
    for (key, value) in env {
        script.push_str(&format!(
            "process.env[{}] = {};\n",
            json_string(key),
            json_string(value)
        ));
    }
    script
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
