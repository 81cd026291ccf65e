//! 命令行参数

use clap::{Parser, Subcommand};

/// 证书解析与访问策略诊断工具
#[derive(Parser, Debug)]
#[command(name = "gatekeeper-probe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 运行结束后把 metrics 输出到 stderr
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 解析域名对应的证书（不输出私钥）
    Certs {
        /// 跳过缓存，直接查库
        #[arg(long)]
        no_cache: bool,

        #[arg(required = true)]
        domains: Vec<String>,
    },

    /// 按 SNI 选择证书，未命中时回退到默认证书
    Sni {
        #[arg(long)]
        no_cache: bool,

        #[arg(required = true)]
        hosts: Vec<String>,
    },

    /// 评估组织访问策略
    Policy {
        org_id: String,
        user_id: String,
        session_id: String,
    },

    /// 单独检查资源会话的最长时长
    SessionLength {
        org_id: String,
        resource_session_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("gatekeeper-probe").chain(args.iter().copied()))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_certs() {
        let cli = parse(&["certs", "a.example.com", "b.example.com"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Certs {
                no_cache: false,
                domains: strings(&["a.example.com", "b.example.com"]),
            }
        );
        assert!(!cli.metrics);

        let cli = parse(&["certs", "--no-cache", "a.example.com", "--metrics"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Certs {
                no_cache: true,
                domains: strings(&["a.example.com"]),
            }
        );
        assert!(cli.metrics);
    }

    #[test]
    fn test_parse_sni() {
        let cli = parse(&["--metrics", "sni", "--no-cache", "app.example.com"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Sni {
                no_cache: true,
                hosts: strings(&["app.example.com"]),
            }
        );
        assert!(cli.metrics);
    }

    #[test]
    fn test_parse_policy() {
        let cli = parse(&["policy", "org_1", "user_1", "sess_1"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Policy {
                org_id: "org_1".to_string(),
                user_id: "user_1".to_string(),
                session_id: "sess_1".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_session_length() {
        let cli = parse(&["session-length", "org_1", "rsess_1"]).unwrap();
        assert_eq!(
            cli.command,
            Command::SessionLength {
                org_id: "org_1".to_string(),
                resource_session_id: "rsess_1".to_string(),
            }
        );
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["--help"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
        assert_eq!(parse(&["--version"]).unwrap_err().kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["certs"]).is_err());
        assert!(parse(&["sni"]).is_err());
        assert!(parse(&["policy", "org_1", "user_1"]).is_err());
        assert!(parse(&["session-length", "org_1"]).is_err());
        assert!(parse(&["serve"]).is_err());
        assert!(parse(&["certs", "--verbose", "a.example.com"]).is_err());
    }
}
