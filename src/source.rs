use crate::classify::{KeyEvent, KeyTransition, PowerKey};
use anyhow::{Context, Result};
use evdev::raw_stream::RawDevice;
use evdev::{InputEvent, InputEventKind, Key, Synchronization};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::collections::VecDeque;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::{Duration, Instant};
use tracing::warn;

/// Pull-based reader over one input device. The raw (non-synthesizing) read
/// mode is used so that a kernel buffer overflow discards the stale backlog
/// instead of replaying reconstructed state; a later fresh press re-anchors
/// the duration tracking.
pub struct EventSource {
    dev: RawDevice,
    queue: VecDeque<KeyEvent>,
}

impl EventSource {
    pub fn new(dev: RawDevice) -> Result<Self> {
        set_nonblocking(&dev).context("setting device non-blocking")?;
        Ok(Self {
            dev,
            queue: VecDeque::new(),
        })
    }

    /// Next power-class key event. `Ok(None)` means the device has nothing
    /// buffered; the caller should `wait_readable` and retry. `Err` is a
    /// fatal read error (device gone).
    pub fn next_event(&mut self) -> Result<Option<KeyEvent>> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }

            let mut overflowed = false;
            match self.dev.fetch_events() {
                Ok(events) => {
                    let now = Instant::now();
                    for raw in events {
                        if is_dropped_marker(&raw) {
                            overflowed = true;
                            break;
                        }
                        if let Some(event) = decode(&raw, now) {
                            self.queue.push_back(event);
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(e).context("reading input events"),
            }

            if overflowed {
                warn!("kernel event buffer overflowed, discarding backlog");
                self.queue.clear();
                self.drain_backlog()?;
            }
        }
    }

    /// Bounded wait for readability; the daemon loop's sole suspension point.
    /// An interrupted wait returns normally so signal delivery falls through
    /// to the caller's stop-flag check.
    pub fn wait_readable(&self, timeout: Duration) -> Result<()> {
        // The raw fd is owned by self.dev and stays open for this borrow.
        let fd = unsafe { BorrowedFd::borrow_raw(self.dev.as_raw_fd()) };
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
        let ms = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        match poll(&mut fds, PollTimeout::from(ms)) {
            Ok(_) => Ok(()),
            Err(Errno::EINTR) => Ok(()),
            Err(e) => Err(e).context("polling input device"),
        }
    }

    /// Read and discard until the device would block again.
    fn drain_backlog(&mut self) -> Result<()> {
        loop {
            match self.dev.fetch_events() {
                Ok(events) => {
                    for _ in events {}
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e).context("draining input backlog"),
            }
        }
    }
}

fn is_dropped_marker(raw: &InputEvent) -> bool {
    matches!(
        raw.kind(),
        InputEventKind::Synchronization(Synchronization::SYN_DROPPED)
    )
}

/// Decode one raw event into a power-class key event. Everything else,
/// including autorepeat (value 2), is discarded.
fn decode(raw: &InputEvent, now: Instant) -> Option<KeyEvent> {
    let key = match raw.kind() {
        InputEventKind::Key(Key::KEY_POWER) => PowerKey::Power,
        InputEventKind::Key(Key::KEY_SLEEP) => PowerKey::Sleep,
        InputEventKind::Key(Key::KEY_WAKEUP) => PowerKey::Wakeup,
        _ => return None,
    };
    let transition = match raw.value() {
        1 => KeyTransition::Pressed,
        0 => KeyTransition::Released,
        _ => return None,
    };
    Some(KeyEvent {
        key,
        transition,
        at: now,
    })
}

fn set_nonblocking(dev: &RawDevice) -> Result<()> {
    let fd = dev.as_raw_fd();

    // Preserve existing flags; just OR in O_NONBLOCK.
    let current = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if current < 0 {
        return Err(io::Error::last_os_error()).context("fcntl(F_GETFL)");
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, current | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error()).context("fcntl(F_SETFL, O_NONBLOCK)");
    }
    Ok(())
}
