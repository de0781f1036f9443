//! OS-level descriptor duplication backends

use std::io;
use std::os::unix::io::RawFd;

/// Makes `dst` refer to the same open file as `src`, closing whatever `dst`
/// referred to before.
pub trait DupDescriptor: Send + Sync {
    fn duplicate(&self, src: RawFd, dst: RawFd) -> io::Result<()>;
}

/// `dup2(2)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Dup2;

impl DupDescriptor for Dup2 {
    fn duplicate(&self, src: RawFd, dst: RawFd) -> io::Result<()> {
        let rc = unsafe { libc::dup2(src, dst) };
        if rc == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

/// `dup3(2)` without flags, for targets whose syscall table lacks `dup2`
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Dup3;

#[cfg(target_os = "linux")]
impl DupDescriptor for Dup3 {
    fn duplicate(&self, src: RawFd, dst: RawFd) -> io::Result<()> {
        // dup3 rejects src == dst where dup2 treats it as a no-op
        if src == dst {
            return Ok(());
        }
        let rc = unsafe { libc::dup3(src, dst, 0) };
        if rc == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

/// The backend for the platform this crate was built for
pub fn platform() -> Box<dyn DupDescriptor> {
    #[cfg(all(target_os = "linux", target_arch = "aarch64"))]
    {
        Box::new(Dup3)
    }
    #[cfg(not(all(target_os = "linux", target_arch = "aarch64")))]
    {
        Box::new(Dup2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File, OpenOptions};
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use tempfile::TempDir;

    fn check_backend(backend: &dyn DupDescriptor) {
        let temp_dir = TempDir::new().unwrap();
        let target_path = temp_dir.path().join("target.log");
        let target = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&target_path)
            .unwrap();
        let mut victim = File::create(temp_dir.path().join("victim.log")).unwrap();

        backend
            .duplicate(target.as_raw_fd(), victim.as_raw_fd())
            .unwrap();
        victim.write_all(b"redirected").unwrap();

        assert_eq!(fs::read_to_string(&target_path).unwrap(), "redirected");
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("victim.log")).unwrap(),
            ""
        );
    }

    #[test]
    fn test_dup2_substitutes_descriptor() {
        check_backend(&Dup2);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_dup3_substitutes_descriptor() {
        check_backend(&Dup3);
    }

    #[test]
    fn test_platform_backend() {
        check_backend(platform().as_ref());
    }

    #[test]
    fn test_bad_descriptor_is_an_error() {
        assert!(Dup2.duplicate(-1, 1000).is_err());
    }
}
