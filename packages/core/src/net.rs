use eyre::{eyre, Result};

/// Split a `host:port` address string.
pub fn parse_host_port(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| eyre!("address [{}] must be host:port", addr))?;
    if host.is_empty() {
        return Err(eyre!("address [{}] has an empty host", addr));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| eyre!("address [{}] has an invalid port", addr))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_port() {
        assert_eq!(
            parse_host_port("127.0.0.1:29054").unwrap(),
            ("127.0.0.1".to_string(), 29054)
        );
        assert!(parse_host_port("127.0.0.1").is_err());
        assert!(parse_host_port(":29054").is_err());
        assert!(parse_host_port("host:notaport").is_err());
    }
}
