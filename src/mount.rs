//! Attaching and detaching disk images.
//!
//! `hdiutil attach` prints one line per partition of the image. Only lines
//! that name a mounted volume look like
//!
//! ```text
//! /dev/disk4s1        Apple_HFS                       /Volumes/Installer
//! ```
//!
//! The first such line wins. Detaching returns before the volume is really
//! gone, so `unmount` polls for the mount point to disappear.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{MountError, UnmountError};
use crate::system::SystemPort;

/// Time between checks for a detached volume.
pub const UNMOUNT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Checks before giving up on a detached volume.
pub const UNMOUNT_MAX_POLLS: u32 = 30;

/// An attached disk image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountHandle {
    /// Device node without `/dev/`, e.g. `disk4s1`
    pub device: String,
    /// Mount point, e.g. `/Volumes/Installer`
    pub volume: PathBuf,
}

/// Find the first mounted volume in `hdiutil attach` output.
///
/// Volumes are expected under `mount_root` (normally `/Volumes`).
pub fn parse_attach_output(stdout: &str, mount_root: &Path) -> Option<MountHandle> {
    let root = mount_root.to_string_lossy();
    let pattern = format!(
        r"^/dev/(\S+)\s+([^/]+?)\s*({}/.+)$",
        regex::escape(root.trim_end_matches('/'))
    );
    // The pattern is built from an escaped path, so it always compiles
    let re = Regex::new(&pattern).ok()?;

    stdout.lines().find_map(|line| {
        let caps = re.captures(line.trim_end())?;
        Some(MountHandle {
            device: caps[1].to_string(),
            volume: PathBuf::from(&caps[3]),
        })
    })
}

/// Mount and unmount disk images through a `SystemPort`.
pub struct MountManager<'a, P: SystemPort> {
    port: &'a P,
}

impl<'a, P: SystemPort> MountManager<'a, P> {
    pub fn new(port: &'a P) -> Self {
        Self { port }
    }

    /// Attach `image` and locate its volume.
    pub fn mount(&self, image: &Path) -> Result<MountHandle, MountError> {
        let output = self
            .port
            .attach(image)
            .map_err(|e| MountError::Spawn(e.to_string()))?;

        if !output.success {
            warn!(image = %image.display(), "hdiutil attach failed");
            return Err(MountError::Attach(output.stderr));
        }

        match parse_attach_output(&output.stdout, self.port.mount_root()) {
            Some(handle) => {
                info!(device = %handle.device, volume = %handle.volume.display(), "mounted");
                Ok(handle)
            }
            None => {
                warn!(stdout = %output.stdout, "no mount point in hdiutil output");
                Err(MountError::NoMountPoint)
            }
        }
    }

    /// Detach the image and wait for its volume to disappear.
    ///
    /// A volume that is already gone counts as unmounted; hdiutil is not
    /// run in that case.
    pub fn unmount(&self, handle: &MountHandle) -> Result<(), UnmountError> {
        if !self.port.volume_exists(&handle.volume) {
            debug!(volume = %handle.volume.display(), "volume already gone");
            return Ok(());
        }

        let output = self
            .port
            .detach(&handle.device)
            .map_err(|e| UnmountError::Spawn(e.to_string()))?;

        if !output.success {
            return Err(UnmountError::Detach(output.stderr));
        }

        for poll in 1..=UNMOUNT_MAX_POLLS {
            self.port.sleep(UNMOUNT_POLL_INTERVAL);
            if !self.port.volume_exists(&handle.volume) {
                info!(volume = %handle.volume.display(), polls = poll, "unmounted");
                return Ok(());
            }
        }

        warn!(volume = %handle.volume.display(), "volume still present after detach");
        Err(UnmountError::StillMounted {
            volume: handle.volume.clone(),
            polls: UNMOUNT_MAX_POLLS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::CommandOutput;
    use std::cell::{Cell, RefCell};

    const ATTACH_OUTPUT: &str = "\
/dev/disk4          \tGUID_partition_scheme          \t
/dev/disk4s1        \tApple_HFS                      \t/Volumes/Installer
/dev/disk5s1        \tApple_HFS                      \t/Volumes/Second
";

    /// Volume that disappears after `present_for` existence checks
    struct FakePort {
        detach: CommandOutput,
        present_for: Cell<u32>,
        exists_checks: Cell<u32>,
        sleeps: RefCell<Vec<Duration>>,
        detach_calls: Cell<u32>,
    }

    impl FakePort {
        fn new(present_for: u32) -> Self {
            Self {
                detach: CommandOutput::ok(""),
                present_for: Cell::new(present_for),
                exists_checks: Cell::new(0),
                sleeps: RefCell::new(Vec::new()),
                detach_calls: Cell::new(0),
            }
        }
    }

    impl SystemPort for FakePort {
        fn attach(&self, _image: &Path) -> anyhow::Result<CommandOutput> {
            Ok(CommandOutput::ok(ATTACH_OUTPUT))
        }

        fn detach(&self, _device: &str) -> anyhow::Result<CommandOutput> {
            self.detach_calls.set(self.detach_calls.get() + 1);
            Ok(self.detach.clone())
        }

        fn run_installer(&self, _package: &Path) -> anyhow::Result<CommandOutput> {
            unreachable!("not used by mount tests")
        }

        fn mount_root(&self) -> &Path {
            Path::new("/Volumes")
        }

        fn volume_exists(&self, _volume: &Path) -> bool {
            self.exists_checks.set(self.exists_checks.get() + 1);
            self.exists_checks.get() <= self.present_for.get()
        }

        fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
        }
    }

    fn handle() -> MountHandle {
        MountHandle {
            device: "disk4s1".into(),
            volume: PathBuf::from("/Volumes/Installer"),
        }
    }

    #[test]
    fn test_parse_first_volume_wins() {
        let handle = parse_attach_output(ATTACH_OUTPUT, Path::new("/Volumes")).unwrap();
        assert_eq!(handle.device, "disk4s1");
        assert_eq!(handle.volume, PathBuf::from("/Volumes/Installer"));
    }

    #[test]
    fn test_parse_space_separated_line() {
        let handle = parse_attach_output(
            "/dev/disk4s1  Apple_HFS  /Volumes/Installer",
            Path::new("/Volumes"),
        )
        .unwrap();
        assert_eq!(
            handle,
            MountHandle {
                device: "disk4s1".into(),
                volume: PathBuf::from("/Volumes/Installer"),
            }
        );
    }

    #[test]
    fn test_parse_volume_name_with_spaces() {
        let handle = parse_attach_output(
            "/dev/disk6s2\t41504653-0000-11AA-AA11-0030654\t/Volumes/Google Chrome 2\n",
            Path::new("/Volumes"),
        )
        .unwrap();
        assert_eq!(handle.device, "disk6s2");
        assert_eq!(handle.volume, PathBuf::from("/Volumes/Google Chrome 2"));
    }

    #[test]
    fn test_parse_custom_mount_root() {
        let output = "/dev/disk4s1\tApple_HFS\t/private/tmp/mnt/Installer\n";
        assert!(parse_attach_output(output, Path::new("/Volumes")).is_none());

        let handle = parse_attach_output(output, Path::new("/private/tmp/mnt/")).unwrap();
        assert_eq!(handle.volume, PathBuf::from("/private/tmp/mnt/Installer"));
    }

    #[test]
    fn test_parse_no_volume() {
        let output = "/dev/disk4\tGUID_partition_scheme\t\n/dev/disk4s1\tApple_HFS\t\n";
        assert!(parse_attach_output(output, Path::new("/Volumes")).is_none());
        assert!(parse_attach_output("", Path::new("/Volumes")).is_none());
    }

    #[test]
    fn test_mount_success() {
        let port = FakePort::new(0);
        let handle = MountManager::new(&port).mount(Path::new("/tmp/x.dmg")).unwrap();
        assert_eq!(handle.device, "disk4s1");
    }

    #[test]
    fn test_unmount_missing_volume_skips_detach() {
        let port = FakePort::new(0);
        MountManager::new(&port).unmount(&handle()).unwrap();
        assert_eq!(port.detach_calls.get(), 0);
        assert!(port.sleeps.borrow().is_empty());
    }

    #[test]
    fn test_unmount_waits_for_volume_to_disappear() {
        // Present for the pre-check and the first two polls
        let port = FakePort::new(3);
        MountManager::new(&port).unmount(&handle()).unwrap();
        assert_eq!(port.detach_calls.get(), 1);
        assert_eq!(port.sleeps.borrow().len(), 3);
    }

    #[test]
    fn test_unmount_gives_up_after_exactly_thirty_polls() {
        let port = FakePort::new(u32::MAX);
        let err = MountManager::new(&port).unmount(&handle()).unwrap_err();

        assert_eq!(err.to_string(), "Volume still exists after unmount");
        let sleeps = port.sleeps.borrow();
        assert_eq!(sleeps.len(), 30);
        assert!(sleeps.iter().all(|d| *d == Duration::from_secs(1)));
        // One pre-check plus one check per poll
        assert_eq!(port.exists_checks.get(), 31);
    }

    #[test]
    fn test_unmount_detach_failure_surfaces_stderr() {
        let mut port = FakePort::new(u32::MAX);
        port.detach = CommandOutput::failed(16, "hdiutil: detach failed - Resource busy\n");

        let err = MountManager::new(&port).unmount(&handle()).unwrap_err();
        assert_eq!(err.to_string(), "hdiutil: detach failed - Resource busy");
        assert!(port.sleeps.borrow().is_empty());
    }
}
