//! Connection descriptors
//!
//! Parses `mongodb://[user[:password]@]host1[:port1][,hostN[:portN]][/[database][?options]]`
//! and reduces it to a normalized form. Two descriptors address the same
//! database iff their normalized forms are equal.

use std::fmt;

use crate::error::{Error, Result};

/// Connection string used when none is configured
pub const DEFAULT_CONNECTION: &str = "mongodb://localhost/";
/// Database used when the connection string names none
pub const DEFAULT_DATABASE: &str = "log4net";
/// Port used when a host names none
pub const DEFAULT_PORT: u16 = 27017;

const SCHEME: &str = "mongodb";
const SRV_SCHEME: &str = "mongodb+srv";
const INVALID_DB_CHARS: &[char] = &['/', '\\', '.', ' ', '"', '$'];

/// One `host:port` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host {
    pub name: String,
    pub port: Option<u16>,
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.name, port),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Login credentials embedded in a descriptor
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A parsed, defaulted connection descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionDescriptor {
    srv: bool,
    credentials: Option<Credentials>,
    hosts: Vec<Host>,
    database: String,
    options: Vec<(String, String)>,
}

impl ConnectionDescriptor {
    /// Parse a descriptor; a blank string selects the default endpoint
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let input = if trimmed.is_empty() {
            format!("{}{}", DEFAULT_CONNECTION, DEFAULT_DATABASE)
        } else {
            trimmed.to_string()
        };
        let malformed = |message: String| Error::connection(redact(&input), message);

        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| malformed("missing scheme separator '://'".to_string()))?;
        let srv = match scheme.to_lowercase().as_str() {
            SCHEME => false,
            SRV_SCHEME => true,
            other => return Err(malformed(format!("unsupported scheme '{}'", other))),
        };

        // Split authority from path and query
        let (authority, tail) = match rest.find(['/', '?']) {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        let (path, query) = match tail.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (tail, None),
        };

        let (credentials, host_list) = match authority.rsplit_once('@') {
            Some((userinfo, hosts)) => (Some(parse_credentials(userinfo).map_err(malformed)?), hosts),
            None => (None, authority),
        };

        let hosts = parse_hosts(host_list, srv).map_err(malformed)?;

        let database = path.trim_start_matches('/');
        if let Some(c) = database.chars().find(|c| INVALID_DB_CHARS.contains(c)) {
            return Err(malformed(format!("invalid character '{}' in database name", c)));
        }
        let database = if database.is_empty() {
            DEFAULT_DATABASE.to_string()
        } else {
            database.to_string()
        };

        let options = match query {
            Some(query) => parse_options(query).map_err(malformed)?,
            None => Vec::new(),
        };

        Ok(Self {
            srv,
            credentials,
            hosts,
            database,
            options,
        })
    }

    /// Name of the logical database
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Endpoints, with ports made explicit
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Embedded credentials
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Query options in declaration order
    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    /// Whether the descriptor uses DNS seed-list discovery
    pub fn is_srv(&self) -> bool {
        self.srv
    }

    /// Canonical string form, including the password; used as a cache key
    pub fn normalized(&self) -> String {
        self.render(false)
    }

    fn render(&self, redacted: bool) -> String {
        let mut out = String::new();
        out.push_str(if self.srv { SRV_SCHEME } else { SCHEME });
        out.push_str("://");

        if let Some(credentials) = &self.credentials {
            out.push_str(&credentials.username);
            if let Some(password) = &credentials.password {
                out.push(':');
                out.push_str(if redacted { "***" } else { password });
            }
            out.push('@');
        }

        let hosts: Vec<String> = self.hosts.iter().map(Host::to_string).collect();
        out.push_str(&hosts.join(","));
        out.push('/');
        out.push_str(&self.database);

        if !self.options.is_empty() {
            let options: Vec<String> = self
                .options
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            out.push('?');
            out.push_str(&options.join("&"));
        }

        out
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}

impl std::str::FromStr for ConnectionDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_credentials(userinfo: &str) -> std::result::Result<Credentials, String> {
    let (username, password) = match userinfo.split_once(':') {
        Some((user, pass)) => (user, Some(pass.to_string())),
        None => (userinfo, None),
    };
    if username.is_empty() {
        return Err("empty username".to_string());
    }
    Ok(Credentials {
        username: username.to_string(),
        password,
    })
}

fn parse_hosts(list: &str, srv: bool) -> std::result::Result<Vec<Host>, String> {
    if list.is_empty() {
        return Err("no hosts given".to_string());
    }

    let mut hosts = Vec::new();
    for entry in list.split(',') {
        // The port of a bracketed IPv6 literal follows the closing bracket
        let split = if entry.starts_with('[') {
            let close = entry
                .find(']')
                .ok_or_else(|| format!("unterminated IPv6 literal '{}'", entry))?;
            match &entry[close + 1..] {
                "" => None,
                rest => match rest.strip_prefix(':') {
                    Some(port) => Some((&entry[..=close], port)),
                    None => return Err(format!("unexpected '{}' after IPv6 literal", rest)),
                },
            }
        } else {
            entry.rsplit_once(':')
        };

        let (name, port) = match split {
            Some((name, port)) => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| format!("invalid port '{}' for host '{}'", port, name))?;
                if port == 0 {
                    return Err(format!("invalid port 0 for host '{}'", name));
                }
                (name, Some(port))
            }
            None => (entry, None),
        };

        if name.is_empty() {
            return Err("empty host name".to_string());
        }
        if srv && port.is_some() {
            return Err("mongodb+srv hosts cannot carry a port".to_string());
        }

        hosts.push(Host {
            name: name.to_lowercase(),
            port: if srv { None } else { Some(port.unwrap_or(DEFAULT_PORT)) },
        });
    }

    if srv && hosts.len() != 1 {
        return Err("mongodb+srv takes exactly one host".to_string());
    }

    Ok(hosts)
}

fn parse_options(query: &str) -> std::result::Result<Vec<(String, String)>, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
            _ => Err(format!("malformed option '{}'", pair)),
        })
        .collect()
}

/// Hide the password of a raw descriptor for error messages
fn redact(raw: &str) -> String {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return raw.to_string();
    };
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    match rest[..authority_end].rsplit_once('@') {
        Some((userinfo, _)) => match userinfo.split_once(':') {
            Some((user, _)) => format!(
                "{}://{}:***@{}",
                scheme,
                user,
                &rest[userinfo.len() + 1..]
            ),
            None => raw.to_string(),
        },
        None => raw.to_string(),
    }
}
