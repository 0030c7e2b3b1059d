/// Observation output: one line on stdout per connection, plain text or NDJSON.
///
/// Plain text columns: `timestamp client_ip:client_port proto://hostname`.
/// Quiet mode prints only connections where a hostname was found.
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use sniff_proto::{DecodeError, Hostname};
use std::io::{self, Write};
use std::net::SocketAddr;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// What one connection revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Found(Hostname),
    NotFound,
    Failed(DecodeError),
}

impl From<Result<Option<Hostname>, DecodeError>> for Observation {
    fn from(result: Result<Option<Hostname>, DecodeError>) -> Self {
        match result {
            Ok(Some(host)) => Self::Found(host),
            Ok(None) => Self::NotFound,
            Err(e) => Self::Failed(e),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Record<'a> {
    Hostname {
        timestamp: &'a str,
        client: String,
        scheme: &'a str,
        host: &'a str,
        url: String,
    },
    NoHostname {
        timestamp: &'a str,
        client: String,
    },
    DecodeError {
        timestamp: &'a str,
        client: String,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    quiet: bool,
    json: bool,
}

impl Reporter {
    pub fn new(quiet: bool, json: bool) -> Self {
        Self { quiet, json }
    }

    /// Start-up header, skipped in quiet and JSON modes.
    pub fn banner(&self, addr: SocketAddr) -> io::Result<()> {
        if self.quiet || self.json {
            return Ok(());
        }
        let mut out = io::stdout().lock();
        writeln!(out, "Hostname Discovery listening on {}", addr)?;
        writeln!(out, "# cols: timestamp, client_ip:client_port, proto://hostname")?;
        out.flush()
    }

    pub fn report(&self, client: SocketAddr, observation: &Observation) -> io::Result<()> {
        let now = Local::now().naive_local();
        let Some(line) = self.render(now, client, observation)? else {
            return Ok(());
        };
        let mut out = io::stdout().lock();
        writeln!(out, "{}", line)?;
        out.flush()
    }

    fn render(
        &self,
        at: NaiveDateTime,
        client: SocketAddr,
        observation: &Observation,
    ) -> serde_json::Result<Option<String>> {
        if self.quiet && !matches!(observation, Observation::Found(_)) {
            return Ok(None);
        }

        let timestamp = at.format(TIMESTAMP_FORMAT).to_string();
        let client = client_display(client);

        if self.json {
            let record = match observation {
                Observation::Found(host) => Record::Hostname {
                    timestamp: &timestamp,
                    client,
                    scheme: host.scheme(),
                    host: host.host(),
                    url: host.to_string(),
                },
                Observation::NotFound => Record::NoHostname {
                    timestamp: &timestamp,
                    client,
                },
                Observation::Failed(e) => Record::DecodeError {
                    timestamp: &timestamp,
                    client,
                    error: e.to_string(),
                },
            };
            return serde_json::to_string(&record).map(Some);
        }

        let line = match observation {
            Observation::Found(host) => format!("{} {} {}", timestamp, client, host),
            Observation::NotFound => format!("{} {} (No hostname found)", timestamp, client),
            Observation::Failed(e) => {
                format!("{} {}: Error parsing TLS Client Hello: {}", timestamp, client, e)
            }
        };
        Ok(Some(line))
    }
}

/// `ip:port` without brackets around IPv6 addresses.
fn client_display(addr: SocketAddr) -> String {
    format!("{}:{}", addr.ip(), addr.port())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sniff_proto::tls::DecodeReason;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_micro_opt(12, 30, 1, 250)
            .unwrap()
    }

    fn client() -> SocketAddr {
        "192.0.2.7:51234".parse().unwrap()
    }

    fn decode_error() -> DecodeError {
        DecodeError {
            reason: DecodeReason::Extensions,
            offset: 118,
        }
    }

    #[test]
    fn test_plain_lines() {
        let r = Reporter::new(false, false);
        let found = Observation::Found(Hostname::Tls("example.com".into()));
        assert_eq!(
            r.render(at(), client(), &found).unwrap().unwrap(),
            "2024-05-01T12:30:01.000250 192.0.2.7:51234 https://example.com"
        );
        assert_eq!(
            r.render(at(), client(), &Observation::NotFound).unwrap().unwrap(),
            "2024-05-01T12:30:01.000250 192.0.2.7:51234 (No hostname found)"
        );
        assert_eq!(
            r.render(at(), client(), &Observation::Failed(decode_error()))
                .unwrap()
                .unwrap(),
            "2024-05-01T12:30:01.000250 192.0.2.7:51234: Error parsing TLS Client Hello: \
             extensions block exceeds buffer at offset 118"
        );
    }

    #[test]
    fn test_quiet_keeps_only_hostnames() {
        let r = Reporter::new(true, false);
        let found = Observation::Found(Hostname::Http("example.org".into()));
        assert!(r.render(at(), client(), &found).unwrap().is_some());
        assert!(r.render(at(), client(), &Observation::NotFound).unwrap().is_none());
        assert!(r
            .render(at(), client(), &Observation::Failed(decode_error()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_ipv6_client() {
        let r = Reporter::new(false, false);
        let found = Observation::Found(Hostname::Http("example.org".into()));
        let v6: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        assert_eq!(
            r.render(at(), v6, &found).unwrap().unwrap(),
            "2024-05-01T12:30:01.000250 2001:db8::1:443 http://example.org"
        );
    }

    #[test]
    fn test_json_records() {
        let r = Reporter::new(false, true);
        let found = Observation::Found(Hostname::Tls("example.com".into()));
        let line = r.render(at(), client(), &found).unwrap().unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["event"], "hostname");
        assert_eq!(v["timestamp"], "2024-05-01T12:30:01.000250");
        assert_eq!(v["client"], "192.0.2.7:51234");
        assert_eq!(v["scheme"], "https");
        assert_eq!(v["host"], "example.com");
        assert_eq!(v["url"], "https://example.com");

        let line = r.render(at(), client(), &Observation::NotFound).unwrap().unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["event"], "no_hostname");

        let line = r
            .render(at(), client(), &Observation::Failed(decode_error()))
            .unwrap()
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["event"], "decode_error");
        assert_eq!(v["error"], "extensions block exceeds buffer at offset 118");
    }

    #[test]
    fn test_observation_from_result() {
        assert_eq!(Observation::from(Ok(None)), Observation::NotFound);
        assert_eq!(
            Observation::from(Err(decode_error())),
            Observation::Failed(decode_error())
        );
    }
}
