//! IMAP mailbox adapter.
//!
//! The `imap` crate is blocking, so sessions run on the blocking pool.
//! Socket read and write timeouts bound every IMAP command, and the
//! session moves between blocking jobs so each message fetch gets its own
//! timeout. A poll fetches at most `max_messages_per_poll` messages; the
//! rest stay unseen for the next tick.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ImapConfig;
use crate::gateway::{GatewayFuture, MailboxGateway};
use crate::mail::parse_message;
use crate::models::email::Email;
use crate::{AppError, Result};

type ImapSession = imap::Session<native_tls::TlsStream<TcpStream>>;

const CONNECT_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Polls one folder over implicit TLS.
#[derive(Clone)]
pub struct ImapMailbox {
    config: Arc<ImapConfig>,
}

impl ImapMailbox {
    /// Build an adapter for `config`. No connection is made yet.
    #[must_use]
    pub fn new(config: ImapConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    fn timeout(&self) -> Duration {
        command_timeout(&self.config)
    }

    /// Run `op` on the blocking pool, bounded by the configured timeout.
    async fn run_blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ImapConfig) -> Result<T> + Send + 'static,
    {
        let config = Arc::clone(&self.config);
        let task = tokio::task::spawn_blocking(move || op(&config));
        match tokio::time::timeout(self.timeout(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(AppError::Transient(format!("imap worker failed: {join}"))),
            Err(_) => Err(AppError::Transient(format!(
                "imap operation timed out after {}s",
                self.config.timeout_seconds
            ))),
        }
    }

    /// Open a session and list the oldest unseen UIDs, then fetch them one
    /// by one. A message that times out ends the batch; what was already
    /// fetched is returned.
    async fn fetch_batch(&self) -> Result<Vec<Email>> {
        let (mut session, uids) = self.run_blocking(open_and_search).await?;
        let mut emails = Vec::with_capacity(uids.len());

        for uid in uids {
            let config = Arc::clone(&self.config);
            let job = tokio::task::spawn_blocking(move || {
                let fetched = fetch_one(&mut session, &config, uid);
                (session, fetched)
            });
            match tokio::time::timeout(self.timeout(), job).await {
                Ok(Ok((returned, fetched))) => {
                    session = returned;
                    match fetched {
                        Ok(Some(email)) => emails.push(email),
                        Ok(None) => warn!(uid, "fetched message has no body"),
                        Err(err) => {
                            warn!(uid, %err, "failed to fetch message, leaving it for the next poll");
                        }
                    }
                }
                Ok(Err(join)) => {
                    warn!(uid, %join, "imap fetch worker failed, ending batch");
                    return Ok(emails);
                }
                Err(_) => {
                    warn!(
                        uid,
                        timeout_secs = self.config.timeout_seconds,
                        "imap fetch timed out, ending batch"
                    );
                    return Ok(emails);
                }
            }
        }

        let logout = tokio::task::spawn_blocking(move || session.logout().ok());
        if tokio::time::timeout(self.timeout(), logout).await.is_err() {
            debug!("imap logout timed out");
        }
        Ok(emails)
    }

    async fn fetch_with_retry(&self) -> Result<Vec<Email>> {
        let mut attempt = 1;
        loop {
            match self.fetch_batch().await {
                Ok(emails) => return Ok(emails),
                Err(err) if err.is_transient() && attempt < CONNECT_ATTEMPTS => {
                    warn!(attempt, %err, "imap fetch failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn command_timeout(config: &ImapConfig) -> Duration {
    Duration::from_secs(config.timeout_seconds.max(1))
}

fn connect_tcp(config: &ImapConfig) -> Result<TcpStream> {
    let timeout = command_timeout(config);
    let connect_failed = |err: &dyn std::fmt::Display| {
        AppError::Transient(format!(
            "failed to connect to imap server {}:{}: {err}",
            config.host, config.port
        ))
    };
    let addrs = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|err| connect_failed(&err))?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(timeout))
                    .and_then(|()| stream.set_write_timeout(Some(timeout)))
                    .map_err(|err| connect_failed(&err))?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(match last_err {
        Some(err) => connect_failed(&err),
        None => connect_failed(&"host resolved to no addresses"),
    })
}

fn open_session(config: &ImapConfig) -> Result<ImapSession> {
    let tls = native_tls::TlsConnector::builder()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tls connector: {err}")))?;
    let tcp = connect_tcp(config)?;
    let stream = tls.connect(config.host.as_str(), tcp).map_err(|err| {
        AppError::Transient(format!("imap tls handshake with {} failed: {err}", config.host))
    })?;

    let mut client = imap::Client::new(stream);
    client
        .read_greeting()
        .map_err(transient("failed to read imap greeting"))?;
    client
        .login(config.username.as_str(), config.password.as_str())
        .map_err(|(err, _)| AppError::Unauthorized(format!("imap login failed: {err}")))
}

fn transient(context: &str) -> impl Fn(imap::Error) -> AppError + '_ {
    move |err| AppError::Transient(format!("{context}: {err}"))
}

fn search_criteria(config: &ImapConfig) -> String {
    if config.search_to.trim().is_empty() {
        "UNSEEN".to_owned()
    } else {
        format!("UNSEEN TO \"{}\"", config.search_to.trim().replace('"', ""))
    }
}

/// Oldest unseen UIDs first, capped at `max_messages_per_poll`.
fn select_batch(mut uids: Vec<u32>, limit: usize) -> Vec<u32> {
    uids.sort_unstable();
    uids.truncate(limit.max(1));
    uids
}

fn open_and_search(config: &ImapConfig) -> Result<(ImapSession, Vec<u32>)> {
    let mut session = open_session(config)?;
    session
        .select(&config.folder)
        .map_err(transient("failed to select folder"))?;

    let unseen: Vec<u32> = session
        .uid_search(search_criteria(config))
        .map_err(transient("failed to search unseen messages"))?
        .into_iter()
        .collect();
    let total = unseen.len();
    let uids = select_batch(unseen, config.max_messages_per_poll);
    debug!(folder = %config.folder, total, batch = uids.len(), "unseen messages");
    Ok((session, uids))
}

fn fetch_one(session: &mut ImapSession, config: &ImapConfig, uid: u32) -> Result<Option<Email>> {
    let fetches = session
        .uid_fetch(uid.to_string(), "(UID RFC822)")
        .map_err(transient("failed to fetch message"))?;
    Ok(fetches.iter().find_map(|fetch| {
        fetch
            .body()
            .map(|raw| parse_message(raw, &config.folder, fetch.uid.unwrap_or(uid)))
    }))
}

fn store_flags(config: &ImapConfig, uid: u32) -> Result<()> {
    let mut session = open_session(config)?;
    session
        .select(&config.folder)
        .map_err(transient("failed to select folder"))?;
    let keyword = config.processed_keyword.trim();
    let flags = if keyword.is_empty() {
        "+FLAGS (\\Seen)".to_owned()
    } else {
        format!("+FLAGS (\\Seen {keyword})")
    };
    session
        .uid_store(uid.to_string(), flags)
        .map_err(transient("failed to store flags"))?;
    session.logout().ok();
    Ok(())
}

impl MailboxGateway for ImapMailbox {
    fn fetch_unseen(&self) -> GatewayFuture<'_, Vec<Email>> {
        Box::pin(self.fetch_with_retry())
    }

    fn mark_seen<'a>(&'a self, email: &'a Email) -> GatewayFuture<'a, ()> {
        let uid = email.uid;
        Box::pin(async move { self.run_blocking(move |config| store_flags(config, uid)).await })
    }
}
