//! Filesystem syscalls against a real temporary directory.

use wasm2c_wasi::ctx::{read_u32, read_u64, write_u32};
use wasm2c_wasi::{Errno, WasiCtx};

const OFLAGS_CREAT: u32 = 1;
const OFLAGS_DIRECTORY: u32 = 2;
const OFLAGS_TRUNC: u32 = 8;
const RIGHTS_FD_READ: u64 = 1 << 1;
const RIGHTS_FD_WRITE: u64 = 1 << 6;

/// A context with one preopen ("/") rooted in a fresh tempdir.
fn preopened() -> (WasiCtx, tempfile::TempDir, u32) {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = WasiCtx::new(vec![], vec![]);
    let fd = ctx.push_preopen("/", dir.path().to_path_buf());
    (ctx, dir, fd)
}

/// Store `path` at guest offset 1024 and return `(ptr, len)`.
fn guest_path(mem: &mut [u8], path: &str) -> (u32, u32) {
    mem[1024..1024 + path.len()].copy_from_slice(path.as_bytes());
    (1024, path.len() as u32)
}

/// Build one iovec at guest offset 2048 pointing at `(ptr, len)`.
fn guest_iovec(mem: &mut [u8], ptr: u32, len: u32) -> u32 {
    write_u32(mem, 2048, ptr).unwrap();
    write_u32(mem, 2052, len).unwrap();
    2048
}

#[test]
fn prestat_reports_the_preopen() {
    let (mut ctx, _dir, fd) = preopened();
    let mut mem = vec![0u8; 4096];
    ctx.fd_prestat_get(&mut mem, fd, 0).unwrap();
    assert_eq!(read_u32(&mem, 0).unwrap(), 0);
    assert_eq!(read_u32(&mem, 4).unwrap(), 1);
    ctx.fd_prestat_dir_name(&mut mem, fd, 16, 1).unwrap();
    assert_eq!(mem[16], b'/');

    // Regular fds have no prestat.
    assert_eq!(ctx.fd_prestat_get(&mut mem, 1, 0).unwrap_err(), Errno::Badf);
}

#[test]
fn open_write_seek_read() {
    let (mut ctx, _dir, dirfd) = preopened();
    let mut mem = vec![0u8; 4096];
    let (ptr, len) = guest_path(&mut mem, "out.txt");

    ctx.path_open(
        &mut mem,
        dirfd,
        0,
        ptr,
        len,
        OFLAGS_CREAT,
        RIGHTS_FD_READ | RIGHTS_FD_WRITE,
        0,
        0,
        0,
    )
    .unwrap();
    let fd = read_u32(&mem, 0).unwrap();

    mem[512..517].copy_from_slice(b"hello");
    let iovs = guest_iovec(&mut mem, 512, 5);
    ctx.fd_write(&mut mem, fd, iovs, 1, 8).unwrap();
    assert_eq!(read_u32(&mem, 8).unwrap(), 5);

    // Seek back to the start and read it again.
    ctx.fd_seek(&mut mem, fd, 0, 0, 16).unwrap();
    assert_eq!(read_u64(&mem, 16).unwrap(), 0);
    let iovs = guest_iovec(&mut mem, 768, 16);
    ctx.fd_read(&mut mem, fd, iovs, 1, 24).unwrap();
    assert_eq!(read_u32(&mem, 24).unwrap(), 5);
    assert_eq!(&mem[768..773], b"hello");

    ctx.fd_filestat_get(&mut mem, fd, 32).unwrap();
    assert_eq!(read_u64(&mem, 32 + 32).unwrap(), 5);
    ctx.fd_close(fd).unwrap();
}

#[test]
fn truncate_discards_old_contents() {
    let (mut ctx, dir, dirfd) = preopened();
    std::fs::write(dir.path().join("t.txt"), b"previous").unwrap();
    let mut mem = vec![0u8; 4096];
    let (ptr, len) = guest_path(&mut mem, "t.txt");
    ctx.path_open(
        &mut mem,
        dirfd,
        0,
        ptr,
        len,
        OFLAGS_TRUNC,
        RIGHTS_FD_WRITE,
        0,
        0,
        0,
    )
    .unwrap();
    assert_eq!(std::fs::read(dir.path().join("t.txt")).unwrap(), b"");
}

#[test]
fn directories_create_rename_remove() {
    let (mut ctx, dir, dirfd) = preopened();
    let mut mem = vec![0u8; 4096];

    let (ptr, len) = guest_path(&mut mem, "sub");
    ctx.path_create_directory(&mut mem, dirfd, ptr, len).unwrap();
    assert!(dir.path().join("sub").is_dir());

    // Open the new directory itself.
    ctx.path_open(&mut mem, dirfd, 0, ptr, len, OFLAGS_DIRECTORY, 0, 0, 0, 0)
        .unwrap();
    let sub_fd = read_u32(&mem, 0).unwrap();
    ctx.fd_fdstat_get(&mut mem, sub_fd, 64).unwrap();
    assert_eq!(mem[64], 3);

    let (new_ptr, new_len) = {
        let path = "renamed";
        mem[3000..3000 + path.len()].copy_from_slice(path.as_bytes());
        (3000u32, path.len() as u32)
    };
    ctx.path_rename(&mut mem, dirfd, ptr, len, dirfd, new_ptr, new_len)
        .unwrap();
    assert!(!dir.path().join("sub").exists());
    assert!(dir.path().join("renamed").is_dir());

    ctx.path_remove_directory(&mut mem, dirfd, new_ptr, new_len)
        .unwrap();
    assert!(!dir.path().join("renamed").exists());
}

#[test]
fn unlink_file() {
    let (mut ctx, dir, dirfd) = preopened();
    std::fs::write(dir.path().join("gone.txt"), b"x").unwrap();
    let mut mem = vec![0u8; 4096];
    let (ptr, len) = guest_path(&mut mem, "gone.txt");
    ctx.path_unlink_file(&mut mem, dirfd, ptr, len).unwrap();
    assert!(!dir.path().join("gone.txt").exists());

    // Missing files surface as Noent.
    assert_eq!(
        ctx.path_unlink_file(&mut mem, dirfd, ptr, len).unwrap_err(),
        Errno::Noent
    );
}

#[test]
fn parent_traversal_is_rejected() {
    let (mut ctx, _dir, dirfd) = preopened();
    let mut mem = vec![0u8; 4096];
    let (ptr, len) = guest_path(&mut mem, "../escape");
    assert_eq!(
        ctx.path_open(&mut mem, dirfd, 0, ptr, len, OFLAGS_CREAT, 0, 0, 0, 0)
            .unwrap_err(),
        Errno::Acces
    );
}

#[test]
fn opening_through_a_file_fd_is_notdir() {
    let mut ctx = WasiCtx::new(vec![], vec![]);
    let mut mem = vec![0u8; 4096];
    let (ptr, len) = guest_path(&mut mem, "x");
    // fd 1 is stdout, not a directory.
    assert_eq!(
        ctx.path_open(&mut mem, 1, 0, ptr, len, 0, 0, 0, 0, 0)
            .unwrap_err(),
        Errno::Notdir
    );
}
