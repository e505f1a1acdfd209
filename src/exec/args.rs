// src/exec/args.rs

use crate::exec::LaunchRequest;

/// Expand placeholders in an argument template.
///
/// Supported: `{chain}`, `{chain_id}`, `{port}`, `{log_dir}`. An argument
/// that mentions `{log_dir}` is dropped entirely when the request has no
/// log directory, together with a directly preceding `--flag` that takes it
/// as a value.
pub fn expand_args(template: &[String], request: &LaunchRequest) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(template.len());

    for arg in template {
        if arg.contains("{log_dir}") && request.log_dir.is_none() {
            if out.last().is_some_and(|prev| is_bare_flag(prev)) {
                out.pop();
            }
            continue;
        }
        out.push(expand_one(arg, request));
    }

    out
}

fn expand_one(arg: &str, request: &LaunchRequest) -> String {
    let mut s = arg
        .replace("{chain_id}", &request.chain.id.to_string())
        .replace("{chain}", &request.chain.name)
        .replace("{port}", &request.rpc_port.to_string());

    if let Some(dir) = &request.log_dir {
        s = s.replace("{log_dir}", &dir.display().to_string());
    }

    s
}

fn is_bare_flag(arg: &str) -> bool {
    arg.starts_with("--") && !arg.contains('=')
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::types::{ChainSpec, ServiceKind};

    fn request(log_dir: Option<&str>) -> LaunchRequest {
        LaunchRequest {
            service: ServiceKind::Connector,
            chain: ChainSpec::new("morden", 62),
            rpc_port: 8545,
            log_dir: log_dir.map(PathBuf::from),
        }
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn placeholders_are_substituted() {
        let template = strings(&["--chain={chain}", "--chain-id", "{chain_id}", "--rpcport", "{port}"]);
        let out = expand_args(&template, &request(None));
        assert_eq!(
            out,
            strings(&["--chain=morden", "--chain-id", "62", "--rpcport", "8545"])
        );
    }

    #[test]
    fn log_dir_flag_is_dropped_without_a_directory() {
        let template = strings(&["--log-dir", "{log_dir}", "server"]);
        assert_eq!(expand_args(&template, &request(None)), strings(&["server"]));
        assert_eq!(
            expand_args(&template, &request(Some("logs"))),
            strings(&["--log-dir", "logs", "server"])
        );
    }

    #[test]
    fn literal_arguments_pass_through() {
        let template = strings(&["--rpccorsdomain", "*"]);
        assert_eq!(expand_args(&template, &request(None)), template);
    }
}
