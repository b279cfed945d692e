//! Scripted chat server for behavioural tests.
//!
//! Accepts one client, announces itself with a server notice, then answers
//! each received line using the first responder whose prefix matches. Every
//! line the client sends is recorded so steps can assert on the wire traffic.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::ZlibDecoder;

use crate::transport::Connection;

/// Origin used for every server-generated line.
const SERVER_NAME: &str = "irc.test";

type Responder = Box<dyn Fn(&str) -> Vec<String> + Send>;

/// Builder for the server's reactions.
pub(in crate::tests) struct Script {
    nick: String,
    counterpart: String,
    rules: Vec<(String, Responder)>,
}

impl Script {
    /// Empty script for a client registering as `nick`.
    pub fn new(nick: &str) -> Self {
        Self {
            nick: nick.to_owned(),
            counterpart: String::from("mtserver"),
            rules: Vec::new(),
        }
    }

    /// Answers lines starting with `prefix` with computed lines.
    pub fn on_with<F>(mut self, prefix: &str, responder: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + 'static,
    {
        self.rules.push((prefix.to_owned(), Box::new(responder)));
        self
    }

    /// Completes registration and any channel join.
    pub fn welcoming(self) -> Self {
        let nick = self.nick.clone();
        let joined = nick.clone();
        self.on_with("NICK ", move |_| {
            vec![
                format!(":{SERVER_NAME} 001 {nick} :Welcome to the test network"),
                format!(":{SERVER_NAME} 375 {nick} :- {SERVER_NAME} Message of the day"),
                format!(":{SERVER_NAME} 376 {nick} :End of /MOTD command."),
            ]
        })
        .on_with("JOIN ", move |line| {
            let channel = line.trim_start_matches("JOIN ").to_owned();
            vec![
                format!(":{joined}!{joined}@127.0.0.1 JOIN {channel}"),
                format!(":{SERVER_NAME} 353 {joined} = {channel} :{joined}"),
                format!(":{SERVER_NAME} 366 {joined} {channel} :End of /NAMES list."),
            ]
        })
    }

    /// Refuses every channel join with numeric 403. Rules match in the order
    /// they were added, so call this before [`Self::welcoming`].
    pub fn refusing_join(self) -> Self {
        let nick = self.nick.clone();
        self.on_with("JOIN ", move |line| {
            let channel = line.trim_start_matches("JOIN ").to_owned();
            vec![format!(
                ":{SERVER_NAME} 403 {nick} {channel} :No such channel"
            )]
        })
    }

    /// Refuses the nickname with numeric 433.
    pub fn refusing_nick(self) -> Self {
        let nick = self.nick.clone();
        self.on_with("NICK ", move |_| {
            vec![format!(
                ":{SERVER_NAME} 433 * {nick} :Nickname is already in use"
            )]
        })
    }

    /// Acknowledges logins from the counterpart.
    pub fn accepting_login(self) -> Self {
        let prefix = format!("PRIVMSG {} : login ", self.counterpart);
        let reply = self.counterpart_says("Login successful");
        self.on_with(&prefix, move |_| vec![reply.clone()])
    }

    /// Answers one application command with `reply`.
    pub fn answering(self, command: &str, reply: &str) -> Self {
        let prefix = format!("PRIVMSG {} : cmd {command}", self.counterpart);
        let reply = self.counterpart_says(reply);
        self.on_with(&prefix, move |_| vec![reply.clone()])
    }

    /// Answers `set_node_list` batches the way the game does: the item name
    /// followed by the number of nodes the batch covers.
    pub fn applying_node_lists(self) -> Self {
        let prefix = format!("PRIVMSG {} : cmd set_node_list ", self.counterpart);
        let counterpart = self.counterpart.clone();
        let nick = self.nick.clone();
        self.on_with(&prefix, move |line| {
            let reply = match node_list_volume(line) {
                Ok((item, volume)) => format!("{item} {volume}"),
                Err(error) => format!("error: {error}"),
            };
            vec![format!(
                ":{counterpart}!bot@127.0.0.1 PRIVMSG {nick} :{reply}"
            )]
        })
    }

    fn counterpart_says(&self, text: &str) -> String {
        format!(
            ":{}!bot@127.0.0.1 PRIVMSG {} :{text}",
            self.counterpart, self.nick
        )
    }

    fn respond(&self, line: &str) -> Vec<String> {
        self.rules
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, responder)| responder(line))
            .unwrap_or_default()
    }
}

/// Decodes a `set_node_list` line into its item and covered node count.
pub(in crate::tests) fn node_list_volume(line: &str) -> Result<(String, u64)> {
    let mut tokens = line.rsplitn(3, ' ');
    let item = tokens.next().context("missing item")?.to_owned();
    let payload = tokens.next().context("missing payload")?;
    let compressed = STANDARD.decode(payload).context("payload is not base64")?;
    let mut record = String::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_string(&mut record)
        .context("payload is not zlib")?;

    let mut volume = 0;
    for region in record.split('|').filter(|region| !region.is_empty()) {
        let numbers = region
            .split(' ')
            .map(str::parse::<i64>)
            .collect::<Result<Vec<_>, _>>()
            .context("region is not numeric")?;
        volume += match numbers.as_slice() {
            [_, _, _] => 1,
            [x1, y1, z1, x2, y2, z2] => {
                (x1.abs_diff(*x2) + 1) * (y1.abs_diff(*y2) + 1) * (z1.abs_diff(*z2) + 1)
            }
            other => return Err(anyhow!("unexpected region {other:?}")),
        };
    }
    Ok((item, volume))
}

/// Handle to a running fake server.
pub(in crate::tests) struct FakeChatServer {
    port: u16,
    received: Arc<Mutex<Vec<String>>>,
    writer: Arc<Mutex<Option<TcpStream>>>,
    disconnected: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeChatServer {
    /// Starts listening on an ephemeral port.
    pub fn spawn(script: Script) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake server")?;
        let port = listener.local_addr().context("local addr")?.port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::new(Mutex::new(None));
        let disconnected = Arc::new(AtomicBool::new(false));
        let handle = {
            let received = Arc::clone(&received);
            let writer = Arc::clone(&writer);
            let disconnected = Arc::clone(&disconnected);
            thread::spawn(move || {
                if let Err(error) = serve(&listener, &script, &received, &writer) {
                    eprintln!("fake chat server stopped: {error:#}");
                }
                disconnected.store(true, Ordering::SeqCst);
            })
        };
        Ok(Self {
            port,
            received,
            writer,
            disconnected,
            handle: Some(handle),
        })
    }

    /// Opens a client connection to the server.
    pub fn connect(&self) -> Result<Connection> {
        let stream = TcpStream::connect(("127.0.0.1", self.port)).context("connect to fake server")?;
        Ok(Connection::Tcp(stream))
    }

    /// Sends an unsolicited line to the client.
    pub fn push_line(&self, line: &str) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            {
                let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(stream) = guard.as_mut() {
                    return write_line(stream, line).context("push line");
                }
            }
            if Instant::now() >= deadline {
                return Err(anyhow!("no client connected"));
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Lines received so far, without terminators.
    pub fn received(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits until a received line satisfies `predicate`.
    pub fn wait_for(&self, predicate: impl Fn(&str) -> bool) -> Option<String> {
        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            if let Some(line) = self.received().into_iter().find(|line| predicate(line)) {
                return Some(line);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl FakeChatServer {
    /// Waits until the client has closed its end of the connection.
    pub fn wait_for_disconnect(&self) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !self.disconnected.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }
}

impl Drop for FakeChatServer {
    fn drop(&mut self) {
        if let Some(stream) = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(
    listener: &TcpListener,
    script: &Script,
    received: &Mutex<Vec<String>>,
    writer: &Mutex<Option<TcpStream>>,
) -> Result<()> {
    let stream = accept_client(listener)?;
    let mut outbound = stream.try_clone().context("clone stream")?;
    write_line(
        &mut outbound,
        &format!(":{SERVER_NAME} NOTICE * :*** Looking up your hostname..."),
    )?;
    *writer.lock().unwrap_or_else(PoisonError::into_inner) =
        Some(outbound.try_clone().context("clone writer")?);

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::ConnectionReset => return Ok(()),
            Err(error) => return Err(error).context("read client line"),
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).to_owned();
        received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(trimmed.clone());
        for response in script.respond(&trimmed) {
            let mut guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(stream) = guard.as_mut() else {
                return Ok(());
            };
            if write_line(stream, &response).is_err() {
                return Ok(());
            }
        }
    }
}

/// Accepts one client, giving up after a few seconds so an aborted test
/// does not hang on drop.
fn accept_client(listener: &TcpListener) -> Result<TcpStream> {
    listener
        .set_nonblocking(true)
        .context("fake server nonblocking")?;
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                stream
                    .set_nonblocking(false)
                    .context("client blocking mode")?;
                return Ok(stream);
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock && Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(error) => return Err(error).context("accept client"),
        }
    }
}

fn write_line(stream: &mut impl Write, line: &str) -> Result<()> {
    stream.write_all(line.as_bytes())?;
    stream.write_all(b"\r\n")?;
    stream.flush()?;
    Ok(())
}
