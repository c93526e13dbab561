//! Interface lookup in shared network config files
//!
//! Some platforms keep every interface definition in one file. Matching is
//! done per line on whole tokens, so `eth0` never matches `eth0.1` and the
//! reverse.

use serde::{Deserialize, Serialize};

/// Syntax of a shared network config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SharedFileSyntax {
    /// ifupdown `/etc/network/interfaces`: `iface <name> <family> <method>`
    Eni,
    /// netifrc `/etc/conf.d/net`: `config_<name>="..."`
    ConfNet,
}

/// Whether `content` defines `interface`
pub fn declares_interface(content: &str, syntax: SharedFileSyntax, interface: &str) -> bool {
    match syntax {
        SharedFileSyntax::Eni => content.lines().any(|line| eni_declares(line, interface)),
        SharedFileSyntax::ConfNet => {
            let key = conf_net_key(interface);
            content.lines().any(|line| conf_net_assigns(line, &key))
        }
    }
}

fn eni_declares(line: &str, interface: &str) -> bool {
    let mut tokens = line.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some("iface"), Some(name)) => name == interface,
        _ => false,
    }
}

/// netifrc variable name for an interface
///
/// netifrc folds every character that is not valid in a shell variable name
/// to `_`, so `eth0.1` is configured as `config_eth0_1`.
pub fn conf_net_key(interface: &str) -> String {
    let folded: String = interface
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("config_{folded}")
}

fn conf_net_assigns(line: &str, key: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with('#') {
        return false;
    }
    match line.split_once('=') {
        Some((name, _)) => name.trim() == key,
        None => false,
    }
}
