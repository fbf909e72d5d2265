//! `psh endpoint <service>`: print the one-time SSH descriptor.
//!
//! Each call issues fresh credentials. The password is masked unless
//! `--show-password` is given.

use anyhow::Result;
use psh_client::ConnectionDescriptor;

use crate::config::Config;

const MASK: &str = "********";

pub async fn run(cfg: &Config, service_id: &str, json: bool, show_password: bool) -> Result<()> {
    let descriptor = super::resolve(cfg, service_id).await?;
    println!("{}", render(service_id, &descriptor, json, show_password)?);
    Ok(())
}

fn render(
    service_id: &str,
    descriptor: &ConnectionDescriptor,
    json: bool,
    show_password: bool,
) -> Result<String> {
    let password = if show_password {
        descriptor.password()
    } else {
        MASK
    };

    if json {
        let value = serde_json::json!({
            "service": service_id,
            "host": descriptor.host(),
            "port": descriptor.port(),
            "user": descriptor.user(),
            "password": password,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    Ok(format!(
        "service:  {service_id}\nendpoint: {}@{}\npassword: {password}",
        descriptor.user(),
        descriptor.authority()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor::from_connection_url("pod@10.0.0.5:22", "p@ss").unwrap()
    }

    #[test]
    fn text_masks_password() {
        let out = render("svc-123", &descriptor(), false, false).unwrap();
        assert!(out.contains("pod@10.0.0.5:22"));
        assert!(out.contains(MASK));
        assert!(!out.contains("p@ss"));
    }

    #[test]
    fn text_reveals_password_on_request() {
        let out = render("svc-123", &descriptor(), false, true).unwrap();
        assert!(out.contains("password: p@ss"));
    }

    #[test]
    fn json_fields() {
        let out = render("svc-123", &descriptor(), true, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["service"], "svc-123");
        assert_eq!(value["host"], "10.0.0.5");
        assert_eq!(value["port"], 22);
        assert_eq!(value["user"], "pod");
        assert_eq!(value["password"], MASK);
    }
}
