//! The WASI context object and its syscall handlers.
//!
//! All state a running guest can observe lives in one `WasiCtx`: the
//! captured argument and environment vectors, the file-descriptor table
//! and the monotonic-clock base. Nothing here is process-global, so a
//! host can run several independent instances side by side.
//!
//! Handlers take the guest's linear memory as a plain byte slice plus
//! the raw integer arguments from the wire, and return `Err(Errno)` for
//! every failure. Guest pointers are validated offsets into the slice;
//! an out-of-range pointer yields `Errno::Fault`, never undefined
//! behavior.

use crate::errno::Errno;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const FILETYPE_CHARACTER_DEVICE: u8 = 2;
const FILETYPE_DIRECTORY: u8 = 3;
const FILETYPE_REGULAR_FILE: u8 = 4;

const CLOCK_REALTIME: u32 = 0;
const CLOCK_MONOTONIC: u32 = 1;

const OFLAGS_CREAT: u32 = 1;
const OFLAGS_DIRECTORY: u32 = 2;
const OFLAGS_EXCL: u32 = 4;
const OFLAGS_TRUNC: u32 = 8;

const FDFLAGS_APPEND: u32 = 1;

const RIGHTS_FD_READ: u64 = 1 << 1;
const RIGHTS_FD_WRITE: u64 = 1 << 6;

const SUBSCRIPTION_SIZE: u32 = 48;
const EVENT_SIZE: u32 = 32;
const SUBCLOCK_FLAG_ABSTIME: u16 = 1;

fn checked_range(mem: &[u8], ptr: u32, len: u32) -> Result<std::ops::Range<usize>, Errno> {
    let start = ptr as usize;
    let end = start.checked_add(len as usize).ok_or(Errno::Fault)?;
    if end > mem.len() {
        return Err(Errno::Fault);
    }
    Ok(start..end)
}

pub fn mem_slice(mem: &[u8], ptr: u32, len: u32) -> Result<&[u8], Errno> {
    Ok(&mem[checked_range(mem, ptr, len)?])
}

pub fn mem_slice_mut(mem: &mut [u8], ptr: u32, len: u32) -> Result<&mut [u8], Errno> {
    let range = checked_range(mem, ptr, len)?;
    Ok(&mut mem[range])
}

pub fn read_u16(mem: &[u8], ptr: u32) -> Result<u16, Errno> {
    let bytes = mem_slice(mem, ptr, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub fn read_u32(mem: &[u8], ptr: u32) -> Result<u32, Errno> {
    let bytes = mem_slice(mem, ptr, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn read_u64(mem: &[u8], ptr: u32) -> Result<u64, Errno> {
    let bytes = mem_slice(mem, ptr, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(raw))
}

pub fn write_u8(mem: &mut [u8], ptr: u32, value: u8) -> Result<(), Errno> {
    mem_slice_mut(mem, ptr, 1)?[0] = value;
    Ok(())
}

pub fn write_u16(mem: &mut [u8], ptr: u32, value: u16) -> Result<(), Errno> {
    mem_slice_mut(mem, ptr, 2)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

pub fn write_u32(mem: &mut [u8], ptr: u32, value: u32) -> Result<(), Errno> {
    mem_slice_mut(mem, ptr, 4)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

pub fn write_u64(mem: &mut [u8], ptr: u32, value: u64) -> Result<(), Errno> {
    mem_slice_mut(mem, ptr, 8)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

fn realtime_nanos() -> Result<u64, Errno> {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| Errno::Io)?;
    Ok(since_epoch.as_nanos() as u64)
}

/// Gather the `(ptr, len)` pairs of an iovec array before touching any
/// of the buffers.
fn iovecs(mem: &[u8], iovs: u32, iovs_len: u32) -> Result<Vec<(u32, u32)>, Errno> {
    let mut list = Vec::with_capacity(iovs_len as usize);
    for i in 0..iovs_len {
        let base = iovs
            .checked_add(i.checked_mul(8).ok_or(Errno::Fault)?)
            .ok_or(Errno::Fault)?;
        let ptr = read_u32(mem, base)?;
        let len = read_u32(mem, base.checked_add(4).ok_or(Errno::Fault)?)?;
        list.push((ptr, len));
    }
    Ok(list)
}

/// One open descriptor. Directories double as preopens; `guest` is the
/// path name reported through `fd_prestat_dir_name`.
pub enum FdEntry {
    Stdin,
    Stdout,
    Stderr,
    File(File),
    Dir { host: PathBuf, guest: String },
}

/// Per-instance WASI state.
pub struct WasiCtx {
    args: Vec<String>,
    env: Vec<(String, String)>,
    fds: Vec<Option<FdEntry>>,
    monotonic_base: Instant,
}

impl WasiCtx {
    /// A context with the three standard streams open as fds 0..2.
    pub fn new(args: Vec<String>, env: Vec<(String, String)>) -> WasiCtx {
        WasiCtx {
            args,
            env,
            fds: vec![
                Some(FdEntry::Stdin),
                Some(FdEntry::Stdout),
                Some(FdEntry::Stderr),
            ],
            monotonic_base: Instant::now(),
        }
    }

    /// Map a host directory into the guest under `guest` and return the
    /// preopened fd number.
    pub fn push_preopen(&mut self, guest: &str, host: PathBuf) -> u32 {
        self.alloc_fd(FdEntry::Dir {
            host,
            guest: guest.to_string(),
        })
    }

    fn alloc_fd(&mut self, entry: FdEntry) -> u32 {
        match self.fds.iter().position(|slot| slot.is_none()) {
            Some(i) => {
                self.fds[i] = Some(entry);
                i as u32
            }
            None => {
                self.fds.push(Some(entry));
                (self.fds.len() - 1) as u32
            }
        }
    }

    fn entry(&mut self, fd: u32) -> Result<&mut FdEntry, Errno> {
        match self.fds.get_mut(fd as usize) {
            Some(Some(entry)) => Ok(entry),
            _ => Err(Errno::Badf),
        }
    }

    /// Resolve a guest-relative path against a preopened directory.
    /// `..` never escapes the preopen.
    fn resolve(
        &mut self,
        mem: &[u8],
        dirfd: u32,
        path_ptr: u32,
        path_len: u32,
    ) -> Result<PathBuf, Errno> {
        let bytes = mem_slice(mem, path_ptr, path_len)?;
        let rel = std::str::from_utf8(bytes).map_err(|_| Errno::Inval)?;
        let mut resolved = match self.entry(dirfd)? {
            FdEntry::Dir { host, .. } => host.clone(),
            _ => return Err(Errno::Notdir),
        };
        for component in rel.split('/') {
            match component {
                "" | "." => {}
                ".." => return Err(Errno::Acces),
                name => resolved.push(name),
            }
        }
        Ok(resolved)
    }

    pub fn args_sizes_get(
        &mut self,
        mem: &mut [u8],
        argc_ptr: u32,
        buf_size_ptr: u32,
    ) -> Result<(), Errno> {
        let buf_size: usize = self.args.iter().map(|a| a.len() + 1).sum();
        write_u32(mem, argc_ptr, self.args.len() as u32)?;
        write_u32(mem, buf_size_ptr, buf_size as u32)
    }

    pub fn args_get(&mut self, mem: &mut [u8], argv: u32, argv_buf: u32) -> Result<(), Errno> {
        let mut slot = argv;
        let mut cursor = argv_buf;
        for arg in &self.args {
            write_u32(mem, slot, cursor)?;
            let len = arg.len() as u32;
            let dst = mem_slice_mut(mem, cursor, len.checked_add(1).ok_or(Errno::Fault)?)?;
            dst[..arg.len()].copy_from_slice(arg.as_bytes());
            dst[arg.len()] = 0;
            cursor = cursor.checked_add(len + 1).ok_or(Errno::Fault)?;
            slot = slot.checked_add(4).ok_or(Errno::Fault)?;
        }
        Ok(())
    }

    pub fn environ_sizes_get(
        &mut self,
        mem: &mut [u8],
        count_ptr: u32,
        buf_size_ptr: u32,
    ) -> Result<(), Errno> {
        // Each entry is serialized as `KEY=VALUE\0`.
        let buf_size: usize = self
            .env
            .iter()
            .map(|(k, v)| k.len() + 1 + v.len() + 1)
            .sum();
        write_u32(mem, count_ptr, self.env.len() as u32)?;
        write_u32(mem, buf_size_ptr, buf_size as u32)
    }

    pub fn environ_get(
        &mut self,
        mem: &mut [u8],
        environ: u32,
        environ_buf: u32,
    ) -> Result<(), Errno> {
        let mut slot = environ;
        let mut cursor = environ_buf;
        for (key, value) in &self.env {
            let pair = format!("{key}={value}");
            write_u32(mem, slot, cursor)?;
            let len = pair.len() as u32;
            let dst = mem_slice_mut(mem, cursor, len.checked_add(1).ok_or(Errno::Fault)?)?;
            dst[..pair.len()].copy_from_slice(pair.as_bytes());
            dst[pair.len()] = 0;
            cursor = cursor.checked_add(len + 1).ok_or(Errno::Fault)?;
            slot = slot.checked_add(4).ok_or(Errno::Fault)?;
        }
        Ok(())
    }

    pub fn clock_time_get(
        &mut self,
        mem: &mut [u8],
        clock_id: u32,
        _precision: u64,
        out_ptr: u32,
    ) -> Result<(), Errno> {
        let nanos = match clock_id {
            CLOCK_REALTIME => realtime_nanos()?,
            CLOCK_MONOTONIC => self.monotonic_base.elapsed().as_nanos() as u64,
            _ => return Err(Errno::Inval),
        };
        write_u64(mem, out_ptr, nanos)
    }

    pub fn fd_close(&mut self, fd: u32) -> Result<(), Errno> {
        match self.fds.get_mut(fd as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(Errno::Badf),
        }
    }

    pub fn fd_read(
        &mut self,
        mem: &mut [u8],
        fd: u32,
        iovs: u32,
        iovs_len: u32,
        nread_ptr: u32,
    ) -> Result<(), Errno> {
        let list = iovecs(mem, iovs, iovs_len)?;
        let entry = self.entry(fd)?;
        let mut total: u32 = 0;
        for (ptr, len) in list {
            let buf = mem_slice_mut(mem, ptr, len)?;
            let n = match entry {
                FdEntry::Stdin => io::stdin().read(buf)?,
                FdEntry::File(file) => file.read(buf)?,
                FdEntry::Stdout | FdEntry::Stderr => return Err(Errno::Badf),
                FdEntry::Dir { .. } => return Err(Errno::Isdir),
            };
            total = total.checked_add(n as u32).ok_or(Errno::TooBig)?;
            if n < buf.len() {
                break;
            }
        }
        write_u32(mem, nread_ptr, total)
    }

    pub fn fd_write(
        &mut self,
        mem: &mut [u8],
        fd: u32,
        iovs: u32,
        iovs_len: u32,
        nwritten_ptr: u32,
    ) -> Result<(), Errno> {
        let list = iovecs(mem, iovs, iovs_len)?;
        let entry = self.entry(fd)?;
        let mut total: u32 = 0;
        for (ptr, len) in list {
            let buf = mem_slice(mem, ptr, len)?;
            match entry {
                FdEntry::Stdout => io::stdout().lock().write_all(buf)?,
                FdEntry::Stderr => io::stderr().lock().write_all(buf)?,
                FdEntry::File(file) => file.write_all(buf)?,
                FdEntry::Stdin => return Err(Errno::Badf),
                FdEntry::Dir { .. } => return Err(Errno::Isdir),
            }
            total = total.checked_add(len).ok_or(Errno::TooBig)?;
        }
        write_u32(mem, nwritten_ptr, total)
    }

    pub fn fd_seek(
        &mut self,
        mem: &mut [u8],
        fd: u32,
        offset: i64,
        whence: u32,
        newoffset_ptr: u32,
    ) -> Result<(), Errno> {
        let entry = self.entry(fd)?;
        let pos = match entry {
            FdEntry::File(file) => {
                let from = match whence {
                    0 => SeekFrom::Start(offset as u64),
                    1 => SeekFrom::Current(offset),
                    2 => SeekFrom::End(offset),
                    _ => return Err(Errno::Inval),
                };
                file.seek(from)?
            }
            FdEntry::Dir { .. } => return Err(Errno::Isdir),
            _ => return Err(Errno::Spipe),
        };
        write_u64(mem, newoffset_ptr, pos)
    }

    pub fn fd_fdstat_get(&mut self, mem: &mut [u8], fd: u32, out_ptr: u32) -> Result<(), Errno> {
        let filetype = match self.entry(fd)? {
            FdEntry::Stdin | FdEntry::Stdout | FdEntry::Stderr => FILETYPE_CHARACTER_DEVICE,
            FdEntry::File(_) => FILETYPE_REGULAR_FILE,
            FdEntry::Dir { .. } => FILETYPE_DIRECTORY,
        };
        mem_slice_mut(mem, out_ptr, 24)?.fill(0);
        write_u8(mem, out_ptr, filetype)?;
        // This shim does not enforce rights; report everything granted.
        write_u64(mem, out_ptr + 8, u64::MAX)?;
        write_u64(mem, out_ptr + 16, u64::MAX)
    }

    pub fn fd_filestat_get(&mut self, mem: &mut [u8], fd: u32, out_ptr: u32) -> Result<(), Errno> {
        let (filetype, size, mtime) = match self.entry(fd)? {
            FdEntry::Stdin | FdEntry::Stdout | FdEntry::Stderr => {
                (FILETYPE_CHARACTER_DEVICE, 0, None)
            }
            FdEntry::File(file) => {
                let meta = file.metadata()?;
                (FILETYPE_REGULAR_FILE, meta.len(), meta.modified().ok())
            }
            FdEntry::Dir { host, .. } => {
                let meta = fs::metadata(host)?;
                (FILETYPE_DIRECTORY, meta.len(), meta.modified().ok())
            }
        };
        let mtim = mtime
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        mem_slice_mut(mem, out_ptr, 64)?.fill(0);
        write_u8(mem, out_ptr + 16, filetype)?;
        write_u64(mem, out_ptr + 24, 1)?;
        write_u64(mem, out_ptr + 32, size)?;
        write_u64(mem, out_ptr + 40, mtim)?;
        write_u64(mem, out_ptr + 48, mtim)?;
        write_u64(mem, out_ptr + 56, mtim)
    }

    pub fn fd_prestat_get(&mut self, mem: &mut [u8], fd: u32, out_ptr: u32) -> Result<(), Errno> {
        let name_len = match self.entry(fd)? {
            FdEntry::Dir { guest, .. } => guest.len() as u32,
            _ => return Err(Errno::Badf),
        };
        // Tag 0: preopened directory.
        write_u32(mem, out_ptr, 0)?;
        write_u32(mem, out_ptr + 4, name_len)
    }

    pub fn fd_prestat_dir_name(
        &mut self,
        mem: &mut [u8],
        fd: u32,
        path_ptr: u32,
        path_len: u32,
    ) -> Result<(), Errno> {
        let guest = match self.entry(fd)? {
            FdEntry::Dir { guest, .. } => guest.clone(),
            _ => return Err(Errno::Badf),
        };
        if guest.len() != path_len as usize {
            return Err(Errno::Inval);
        }
        mem_slice_mut(mem, path_ptr, path_len)?.copy_from_slice(guest.as_bytes());
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn path_open(
        &mut self,
        mem: &mut [u8],
        dirfd: u32,
        _dirflags: u32,
        path_ptr: u32,
        path_len: u32,
        oflags: u32,
        rights_base: u64,
        _rights_inheriting: u64,
        fdflags: u32,
        out_fd_ptr: u32,
    ) -> Result<(), Errno> {
        let path = self.resolve(mem, dirfd, path_ptr, path_len)?;
        if oflags & OFLAGS_DIRECTORY != 0 {
            if !fs::metadata(&path)?.is_dir() {
                return Err(Errno::Notdir);
            }
            let fd = self.alloc_fd(FdEntry::Dir {
                host: path,
                guest: String::new(),
            });
            return write_u32(mem, out_fd_ptr, fd);
        }
        let wants_read = rights_base & RIGHTS_FD_READ != 0;
        let wants_write = rights_base & RIGHTS_FD_WRITE != 0
            || oflags & (OFLAGS_CREAT | OFLAGS_TRUNC) != 0
            || fdflags & FDFLAGS_APPEND != 0;
        let mut opts = OpenOptions::new();
        opts.read(wants_read || !wants_write);
        opts.write(wants_write);
        if oflags & OFLAGS_CREAT != 0 {
            opts.create(true);
        }
        if oflags & OFLAGS_EXCL != 0 {
            opts.create_new(true);
        }
        if oflags & OFLAGS_TRUNC != 0 {
            opts.truncate(true);
        }
        if fdflags & FDFLAGS_APPEND != 0 {
            opts.append(true);
        }
        let file = opts.open(&path)?;
        let fd = self.alloc_fd(FdEntry::File(file));
        write_u32(mem, out_fd_ptr, fd)
    }

    pub fn path_create_directory(
        &mut self,
        mem: &mut [u8],
        dirfd: u32,
        path_ptr: u32,
        path_len: u32,
    ) -> Result<(), Errno> {
        let path = self.resolve(mem, dirfd, path_ptr, path_len)?;
        fs::create_dir(path)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn path_rename(
        &mut self,
        mem: &mut [u8],
        old_dirfd: u32,
        old_path_ptr: u32,
        old_path_len: u32,
        new_dirfd: u32,
        new_path_ptr: u32,
        new_path_len: u32,
    ) -> Result<(), Errno> {
        let old = self.resolve(mem, old_dirfd, old_path_ptr, old_path_len)?;
        let new = self.resolve(mem, new_dirfd, new_path_ptr, new_path_len)?;
        fs::rename(old, new)?;
        Ok(())
    }

    pub fn path_unlink_file(
        &mut self,
        mem: &mut [u8],
        dirfd: u32,
        path_ptr: u32,
        path_len: u32,
    ) -> Result<(), Errno> {
        let path = self.resolve(mem, dirfd, path_ptr, path_len)?;
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn path_remove_directory(
        &mut self,
        mem: &mut [u8],
        dirfd: u32,
        path_ptr: u32,
        path_len: u32,
    ) -> Result<(), Errno> {
        let path = self.resolve(mem, dirfd, path_ptr, path_len)?;
        fs::remove_dir(path)?;
        Ok(())
    }

    pub fn random_get(&mut self, mem: &mut [u8], buf_ptr: u32, buf_len: u32) -> Result<(), Errno> {
        let buf = mem_slice_mut(mem, buf_ptr, buf_len)?;
        getrandom::getrandom(buf).map_err(|_| Errno::Io)
    }

    /// Clock subscriptions only: sleeps for the shortest requested
    /// timeout, then reports every subscription as fired.
    pub fn poll_oneoff(
        &mut self,
        mem: &mut [u8],
        subs_ptr: u32,
        events_ptr: u32,
        nsubscriptions: u32,
        nevents_ptr: u32,
    ) -> Result<(), Errno> {
        if nsubscriptions == 0 {
            return Err(Errno::Inval);
        }
        let mut wait: Option<Duration> = None;
        let mut userdata = Vec::with_capacity(nsubscriptions as usize);
        for i in 0..nsubscriptions {
            let base = subs_ptr
                .checked_add(i.checked_mul(SUBSCRIPTION_SIZE).ok_or(Errno::Fault)?)
                .ok_or(Errno::Fault)?;
            let data = read_u64(mem, base)?;
            let tag = mem_slice(mem, base + 8, 1)?[0];
            if tag != 0 {
                return Err(Errno::Notsup);
            }
            let clock_id = read_u32(mem, base + 16)?;
            let timeout = read_u64(mem, base + 24)?;
            let flags = read_u16(mem, base + 40)?;
            let nanos = if flags & SUBCLOCK_FLAG_ABSTIME != 0 {
                let now = match clock_id {
                    CLOCK_REALTIME => realtime_nanos()?,
                    CLOCK_MONOTONIC => self.monotonic_base.elapsed().as_nanos() as u64,
                    _ => return Err(Errno::Inval),
                };
                timeout.saturating_sub(now)
            } else {
                timeout
            };
            let d = Duration::from_nanos(nanos);
            wait = Some(match wait {
                Some(w) => w.min(d),
                None => d,
            });
            userdata.push(data);
        }
        if let Some(d) = wait {
            std::thread::sleep(d);
        }
        for (i, data) in userdata.iter().enumerate() {
            let base = events_ptr
                .checked_add((i as u32).checked_mul(EVENT_SIZE).ok_or(Errno::Fault)?)
                .ok_or(Errno::Fault)?;
            mem_slice_mut(mem, base, EVENT_SIZE)?.fill(0);
            write_u64(mem, base, *data)?;
            write_u16(mem, base + 8, Errno::Success.code())?;
        }
        write_u32(mem, nevents_ptr, userdata.len() as u32)
    }

    /// Terminates the host process; never returns.
    pub fn proc_exit(&mut self, code: u32) -> ! {
        std::process::exit(code as i32)
    }

    /// Non-standard stderr trace hook.
    pub fn debug(&mut self, mem: &[u8], ptr: u32, len: u32) -> Result<(), Errno> {
        let bytes = mem_slice(mem, ptr, len)?;
        eprintln!("wasi debug: {}", String::from_utf8_lossy(bytes));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_pointers_fault() {
        let mut mem = vec![0u8; 64];
        assert_eq!(read_u32(&mem, 61).unwrap_err(), Errno::Fault);
        assert_eq!(write_u64(&mut mem, u32::MAX, 1).unwrap_err(), Errno::Fault);
        assert_eq!(mem_slice(&mem, 0, 65).unwrap_err(), Errno::Fault);
        assert!(write_u32(&mut mem, 60, 7).is_ok());
        assert_eq!(read_u32(&mem, 60).unwrap(), 7);
    }

    #[test]
    fn args_round_trip() {
        let mut ctx = WasiCtx::new(vec!["wasm2c".to_string(), "in.wasm".to_string()], vec![]);
        let mut mem = vec![0u8; 256];
        ctx.args_sizes_get(&mut mem, 0, 4).unwrap();
        assert_eq!(read_u32(&mem, 0).unwrap(), 2);
        assert_eq!(read_u32(&mem, 4).unwrap(), 7 + 8);

        ctx.args_get(&mut mem, 8, 100).unwrap();
        let first = read_u32(&mem, 8).unwrap();
        let second = read_u32(&mem, 12).unwrap();
        assert_eq!(first, 100);
        assert_eq!(&mem[first as usize..first as usize + 7], b"wasm2c\0");
        assert_eq!(second, 107);
        assert_eq!(&mem[second as usize..second as usize + 8], b"in.wasm\0");
    }

    #[test]
    fn environ_round_trip() {
        let mut ctx = WasiCtx::new(vec![], vec![("HOME".to_string(), "/root".to_string())]);
        let mut mem = vec![0u8; 128];
        ctx.environ_sizes_get(&mut mem, 0, 4).unwrap();
        assert_eq!(read_u32(&mem, 0).unwrap(), 1);
        assert_eq!(read_u32(&mem, 4).unwrap(), 11);
        ctx.environ_get(&mut mem, 8, 32).unwrap();
        assert_eq!(&mem[32..43], b"HOME=/root\0");
    }

    #[test]
    fn monotonic_clock_advances() {
        let mut ctx = WasiCtx::new(vec![], vec![]);
        let mut mem = vec![0u8; 16];
        ctx.clock_time_get(&mut mem, CLOCK_MONOTONIC, 0, 0).unwrap();
        let first = read_u64(&mem, 0).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        ctx.clock_time_get(&mut mem, CLOCK_MONOTONIC, 0, 8).unwrap();
        let second = read_u64(&mem, 8).unwrap();
        assert!(second > first);
    }

    #[test]
    fn unknown_clock_is_invalid() {
        let mut ctx = WasiCtx::new(vec![], vec![]);
        let mut mem = vec![0u8; 8];
        assert_eq!(
            ctx.clock_time_get(&mut mem, 99, 0, 0).unwrap_err(),
            Errno::Inval
        );
    }

    #[test]
    fn close_frees_and_rejects() {
        let mut ctx = WasiCtx::new(vec![], vec![]);
        assert!(ctx.fd_close(1).is_ok());
        assert_eq!(ctx.fd_close(1).unwrap_err(), Errno::Badf);
        assert_eq!(ctx.fd_close(42).unwrap_err(), Errno::Badf);
    }

    #[test]
    fn fd_numbers_are_reused() {
        let mut ctx = WasiCtx::new(vec![], vec![]);
        let fd = ctx.push_preopen("/", PathBuf::from("/tmp"));
        assert_eq!(fd, 3);
        ctx.fd_close(fd).unwrap();
        let fd2 = ctx.push_preopen("/", PathBuf::from("/tmp"));
        assert_eq!(fd2, 3);
    }

    #[test]
    fn random_get_fills_buffer() {
        let mut ctx = WasiCtx::new(vec![], vec![]);
        let mut mem = vec![0u8; 64];
        ctx.random_get(&mut mem, 0, 64).unwrap();
        assert!(mem.iter().any(|b| *b != 0));
    }
}
