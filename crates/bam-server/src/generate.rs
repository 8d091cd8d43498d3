//! Files printed by `bam generate`

use clap::ValueEnum;

use bam_core::config::BamConfig;
use bam_core::ConfigError;

/// What `bam generate` can print
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Template {
    /// Configuration file with the effective values
    Config,
    /// launchd plist forwarding port 80 to the proxy (macOS)
    Firewall,
}

/// Render `template` for `config`
pub fn render(template: Template, config: &BamConfig) -> Result<String, ConfigError> {
    match template {
        Template::Config => Ok(toml::to_string_pretty(config)?),
        Template::Firewall => Ok(firewall_plist(config.proxy_port)),
    }
}

fn firewall_plist(proxy_port: u16) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>Label</key>
	<string>bam.firewall</string>
	<key>ProgramArguments</key>
	<array>
		<string>/bin/sh</string>
		<string>-c</string>
		<string>
			sysctl -w net.inet.ip.forwarding=1;
			echo "rdr pass proto tcp from any to any port {{80,{port}}} -> 127.0.0.1 port {port}" | pfctl -a "com.apple/250.BamFirewall" -Ef -
		</string>
	</array>
	<key>RunAtLoad</key>
	<true/>
	<key>UserName</key>
	<string>root</string>
</dict>
</plist>
"#,
        port = proxy_port
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_template_round_trips() {
        let mut config = BamConfig::default();
        config.tld = "dev".to_string();

        let text = render(Template::Config, &config).unwrap();
        let parsed: BamConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.tld, "dev");
        assert_eq!(parsed.proxy_port, config.proxy_port);
    }

    #[test]
    fn test_firewall_uses_proxy_port() {
        let config = BamConfig {
            proxy_port: 4000,
            ..Default::default()
        };
        let plist = render(Template::Firewall, &config).unwrap();
        assert!(plist.contains("port {80,4000} -> 127.0.0.1 port 4000"));
        assert!(plist.contains("<string>bam.firewall</string>"));
    }
}
