/*
* Name registry
* Resolve the vms by name from the host through entries in a hosts(5) file.
*/
use crate::config::{short_name, HOSTS_FILE};
use owo_colors::OwoColorize;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// Error handling
use civirt_error::{CivirtError, ProvisionError};
use log::{info, warn};
use miette::Result;

/// Marks the lines this tool owns.
pub const MARKER: &str = "# added by civirt";

/// Shared host-side name to address mapping.
pub trait NameRegistry: Send + Sync {
    /// Returns false when an entry for the fqdn is already present.
    fn add_entry(&self, fqdn: &str, address: Ipv4Addr) -> Result<bool, CivirtError>;
    /// Returns false when no owned entry for the fqdn was found.
    fn remove_entry(&self, fqdn: &str) -> Result<bool, CivirtError>;
}

/// Render the line owned by a vm.
pub fn entry(fqdn: &str, address: Ipv4Addr) -> String {
    format!("{address}\t{fqdn}\t{}\t{MARKER}", short_name(fqdn))
}

/// Whether the hostname field of a hosts line is exactly the fqdn.
fn has_fqdn(line: &str, fqdn: &str) -> bool {
    let line = line.trim();
    if line.starts_with('#') {
        return false;
    }
    line.split_whitespace().nth(1) == Some(fqdn)
}

fn is_owned(line: &str) -> bool {
    line.trim_end_matches(['\n', '\r']).trim_end().ends_with(MARKER)
}

/*
* A hosts file shared by every vm of a batch.
* Every call holds the lock for its whole read-modify-write cycle.
*/
#[derive(Debug)]
pub struct HostsFile {
    path: PathBuf,
    lock: Mutex<()>,
}
impl Default for HostsFile {
    fn default() -> Self {
        Self::new(HOSTS_FILE)
    }
}
impl HostsFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            lock: Mutex::new(()),
        }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    fn io_error(&self, origin: io::Error) -> CivirtError {
        ProvisionError::RegistryIo {
            path: self.path.display().to_string(),
            origin,
        }
        .into()
    }
    /// A missing file reads as an empty one.
    /// Bytes are kept as they are, the file may not be valid utf-8.
    fn read(&self) -> io::Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(v) => Ok(v),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e),
        }
    }
    fn try_add(&self, fqdn: &str, address: Ipv4Addr) -> io::Result<bool> {
        let content = self.read()?;
        if lines(&content).any(|line| has_fqdn(&String::from_utf8_lossy(line), fqdn)) {
            return Ok(false);
        }
        let mut line = entry(fqdn, address);
        line.push('\n');
        if !content.is_empty() && !content.ends_with(b"\n") {
            line.insert(0, '\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(true)
    }
    fn try_remove(&self, fqdn: &str) -> io::Result<bool> {
        let mut file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        let mut content = vec![];
        file.read_to_end(&mut content)?;

        let mut removed = false;
        let kept: Vec<u8> = lines(&content)
            .filter(|line| {
                let line = String::from_utf8_lossy(line);
                let matched = is_owned(&line) && has_fqdn(&line, fqdn);
                removed |= matched;
                !matched
            })
            .flatten()
            .copied()
            .collect();

        if removed {
            // Rewrite in place, the file may be a bind mount.
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&kept)?;
            file.set_len(kept.len() as u64)?;
        }
        Ok(removed)
    }
}

/// Lines with their terminator.
fn lines(content: &[u8]) -> impl Iterator<Item = &[u8]> {
    content.split_inclusive(|e| *e == b'\n')
}

impl NameRegistry for HostsFile {
    fn add_entry(&self, fqdn: &str, address: Ipv4Addr) -> Result<bool, CivirtError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let added = self.try_add(fqdn, address).map_err(|e| self.io_error(e))?;
        if added {
            info!(
                "{} {} -- added {:?} to {}",
                "[hosts]".yellow(),
                fqdn,
                entry(fqdn, address),
                self.path.display()
            );
        } else {
            warn!(
                "{} {} -- entry already present in {}, skipping.",
                "[hosts]".yellow(),
                fqdn,
                self.path.display()
            );
        }
        Ok(added)
    }
    fn remove_entry(&self, fqdn: &str) -> Result<bool, CivirtError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let removed = self.try_remove(fqdn).map_err(|e| self.io_error(e))?;
        if removed {
            info!(
                "{} {} -- removed entry from {}",
                "[hosts]".yellow(),
                fqdn,
                self.path.display()
            );
        } else {
            info!(
                "{} {} -- no entry found in {}",
                "[hosts]".yellow(),
                fqdn,
                self.path.display()
            );
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use miette::IntoDiagnostic;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const ORIGINAL: &str = "127.0.0.1\tlocalhost\n\
        # web1.test is managed by hand elsewhere\n\
        10.0.0.9 other.test other\n";

    fn hosts(content: &str) -> Result<(tempfile::TempDir, HostsFile)> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let path = dir.path().join("hosts");
        fs::write(&path, content).into_diagnostic()?;
        Ok((dir, HostsFile::new(&path)))
    }

    fn count(registry: &HostsFile, fqdn: &str) -> Result<usize> {
        let content = fs::read(registry.path()).into_diagnostic()?;
        let content = String::from_utf8_lossy(&content);
        Ok(content.lines().filter(|l| has_fqdn(l, fqdn)).count())
    }

    #[test]
    fn render_entry() {
        assert_eq!(
            entry("web1.test", Ipv4Addr::new(192, 168, 122, 10)),
            "192.168.122.10\tweb1.test\tweb1\t# added by civirt"
        );
    }

    #[test]
    fn add_is_idempotent() -> Result<()> {
        let (_dir, registry) = hosts(ORIGINAL)?;
        let address = Ipv4Addr::new(192, 168, 122, 10);

        assert!(registry.add_entry("web1.test", address)?);
        assert!(!registry.add_entry("web1.test", address)?);
        assert_eq!(count(&registry, "web1.test")?, 1);

        let content = fs::read_to_string(registry.path()).into_diagnostic()?;
        assert!(content.starts_with(ORIGINAL));
        Ok(())
    }

    #[test]
    fn add_matches_whole_field() -> Result<()> {
        let (_dir, registry) = hosts("10.0.0.1\tweb1.test.example\tweb1\n")?;
        assert!(registry.add_entry("web1.test", Ipv4Addr::new(10, 0, 0, 2))?);
        assert_eq!(count(&registry, "web1.test")?, 1);
        Ok(())
    }

    #[test]
    fn add_terminates_last_line() -> Result<()> {
        let (_dir, registry) = hosts("127.0.0.1\tlocalhost")?;
        registry.add_entry("web1.test", Ipv4Addr::new(10, 0, 0, 2))?;
        let content = fs::read_to_string(registry.path()).into_diagnostic()?;
        assert_eq!(
            content,
            "127.0.0.1\tlocalhost\n10.0.0.2\tweb1.test\tweb1\t# added by civirt\n"
        );
        Ok(())
    }

    #[test]
    fn add_creates_missing_file() -> Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let registry = HostsFile::new(dir.path().join("hosts"));
        assert!(registry.add_entry("web1.test", Ipv4Addr::new(10, 0, 0, 2))?);
        assert_eq!(count(&registry, "web1.test")?, 1);
        Ok(())
    }

    #[test]
    fn remove_is_idempotent() -> Result<()> {
        let (_dir, registry) = hosts(ORIGINAL)?;
        registry.add_entry("web1.test", Ipv4Addr::new(192, 168, 122, 10))?;

        assert!(registry.remove_entry("web1.test")?);
        let content = fs::read_to_string(registry.path()).into_diagnostic()?;
        assert_eq!(content, ORIGINAL);

        assert!(!registry.remove_entry("web1.test")?);
        let content = fs::read_to_string(registry.path()).into_diagnostic()?;
        assert_eq!(content, ORIGINAL);
        Ok(())
    }

    #[test]
    fn remove_keeps_unmarked_and_other_entries() -> Result<()> {
        let content = "10.0.0.1\tweb1.test\tweb1\n\
            10.0.0.2\tdb1.test\tdb1\t# added by civirt\n\
            10.0.0.3\tweb1.test\tweb1\t# added by civirt\n\
            10.0.0.4\tlast.test\tlast";
        let (_dir, registry) = hosts(content)?;

        assert!(registry.remove_entry("web1.test")?);
        let res = fs::read_to_string(registry.path()).into_diagnostic()?;
        assert_eq!(
            res,
            "10.0.0.1\tweb1.test\tweb1\n\
            10.0.0.2\tdb1.test\tdb1\t# added by civirt\n\
            10.0.0.4\tlast.test\tlast"
        );
        Ok(())
    }

    #[test]
    fn non_utf8_lines_are_kept_as_is() -> Result<()> {
        let original = b"127.0.0.1\tlocalhost\n10.0.0.7\tcaf\xe9.test\t# \xff\xfe\n".to_vec();
        let dir = tempfile::tempdir().into_diagnostic()?;
        let path = dir.path().join("hosts");
        fs::write(&path, &original).into_diagnostic()?;
        let registry = HostsFile::new(&path);

        assert!(registry.add_entry("web1.test", Ipv4Addr::new(10, 0, 0, 2))?);
        assert_eq!(count(&registry, "web1.test")?, 1);
        let content = fs::read(&path).into_diagnostic()?;
        assert!(content.starts_with(&original));

        assert!(registry.remove_entry("web1.test")?);
        assert_eq!(fs::read(&path).into_diagnostic()?, original);
        Ok(())
    }

    #[test]
    fn remove_from_missing_file() -> Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let registry = HostsFile::new(dir.path().join("hosts"));
        assert!(!registry.remove_entry("web1.test")?);
        Ok(())
    }

    #[test]
    fn unwritable_registry_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        // A directory can't be opened as a hosts file.
        let registry = HostsFile::new(dir.path());
        let res = registry.add_entry("web1.test", Ipv4Addr::new(10, 0, 0, 2));
        assert!(matches!(
            res,
            Err(CivirtError::ProvisionError(ProvisionError::RegistryIo { .. }))
        ));
        Ok(())
    }

    #[test]
    fn concurrent_adds_are_serialized() -> Result<()> {
        let (_dir, registry) = hosts("")?;
        let registry = Arc::new(registry);
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let fqdn = format!("vm{}.test", i % 4);
                    registry.add_entry(&fqdn, Ipv4Addr::new(10, 0, 0, i as u8))
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread panicked")?;
        }
        for i in 0..4 {
            assert_eq!(count(&registry, &format!("vm{i}.test"))?, 1);
        }
        Ok(())
    }
}
