//! Segment file framing: how one `LedgerEntry` is laid out on disk.
//!
//! Each record is written as two separate `write_all` calls — the body
//! (everything except the hash) followed by the hash trailer — so that the
//! payload bytes physically precede the hash link referencing them, per
//! spec §4.4's write-ordering requirement. A crash between the two leaves a
//! dangling body with no trailer; `read_all` treats that as the end of the
//! log rather than a corrupt entry.

use crate::ledger::entry::{Hash, LedgerEntry};
use crate::wire::frame::HEADER_LEN;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};

#[derive(Serialize, Deserialize)]
struct Body {
    index: u64,
    term: u64,
    header: [u8; HEADER_LEN],
    payload: Vec<u8>,
    previous_hash: Hash,
}

/// Appends one entry to `file`, returning once the bytes are handed to the
/// OS (the caller decides whether/when to fsync).
pub fn append_entry(file: &mut File, entry: &LedgerEntry) -> io::Result<()> {
    let body = Body {
        index: entry.index,
        term: entry.term,
        header: entry.header,
        payload: entry.payload.clone(),
        previous_hash: entry.previous_hash,
    };
    let body_bytes = bincode::serialize(&body)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    file.write_all(&(body_bytes.len() as u32).to_be_bytes())?;
    file.write_all(&body_bytes)?;
    file.write_all(&entry.hash)?;
    Ok(())
}

/// Replays every complete record in `file` in order. Stops silently at the
/// first incomplete trailing record (the crash-recovery case above).
pub fn read_all(file: &mut File) -> io::Result<Vec<LedgerEntry>> {
    let mut entries = Vec::new();
    loop {
        let mut len_buf = [0u8; 4];
        if !read_exact_or_stop(file, &mut len_buf)? {
            break;
        }
        let body_len = u32::from_be_bytes(len_buf) as usize;
        let mut body_buf = vec![0u8; body_len];
        if !read_exact_or_stop(file, &mut body_buf)? {
            break;
        }
        let mut hash = [0u8; 32];
        if !read_exact_or_stop(file, &mut hash)? {
            break;
        }
        let body: Body = match bincode::deserialize(&body_buf) {
            Ok(b) => b,
            Err(_) => break,
        };
        entries.push(LedgerEntry {
            index: body.index,
            term: body.term,
            header: body.header,
            payload: body.payload,
            previous_hash: body.previous_hash,
            hash,
        });
    }
    Ok(entries)
}

/// `read_exact`, but a clean EOF before any byte is read returns `Ok(false)`
/// instead of an error, so callers can distinguish "nothing more to read"
/// from "stream broke mid-record".
fn read_exact_or_stop(file: &mut File, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
