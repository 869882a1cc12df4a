//! Cross-process integration tests
//!
//! Uses fork() to create genuinely independent processes, so kernel attach
//! counting and name persistence are exercised for real.
//!
//! Run with: cargo test --features integration

#[cfg(all(test, feature = "integration"))]
mod integration {
    use std::time::{SystemTime, UNIX_EPOCH};

    use nix::sys::wait::{waitpid, WaitStatus};
    use nix::unistd::{fork, ForkResult};

    use xshm_core::{Detach, ElementType, ShmManager, KEY_MAX, KEY_MIN};

    fn nanos() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    }

    fn unique_key() -> u32 {
        KEY_MIN + (nanos() as u32).wrapping_mul(2654435761) % (KEY_MAX - KEY_MIN)
    }

    fn unique_name(tag: &str) -> String {
        format!("/xshm_it_{}_{}", tag, nanos())
    }

    fn is_exit_success(status: WaitStatus) -> bool {
        matches!(status, WaitStatus::Exited(_, code) if code == 0)
    }

    /// Whether the host lets us touch kernel shared memory at all
    fn shm_available() -> bool {
        let shm = ShmManager::new();
        match shm.create(16, ElementType::RawBytes) {
            Ok(seg) => {
                let key = seg.key().unwrap();
                let _ = shm.destroy(key);
                true
            }
            Err(err) => {
                eprintln!("skipping: {err}");
                false
            }
        }
    }

    #[test]
    fn test_named_object_outlives_child() {
        if !shm_available() {
            return;
        }
        let name = unique_name("rw");

        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let shm = ShmManager::new();
                let mut seg = shm
                    .create_named(&name, 1024, ElementType::RawBytes)
                    .unwrap()
                    .unwrap();
                let data = b"Hello from child!";
                seg.bytes_mut().unwrap()[..data.len()].copy_from_slice(data);
                // Unmap without unlinking so the parent can still open the
                // name after this process is gone.
                assert_eq!(shm.detach(name.as_str()).unwrap(), Detach::Detached(1));
                std::process::exit(0);
            }
            ForkResult::Parent { child } => {
                let status = waitpid(child, None).unwrap();
                assert!(is_exit_success(status));

                let shm = ShmManager::new();
                let view = shm
                    .get(name.as_str(), ElementType::RawBytes)
                    .unwrap()
                    .expect("name should outlive the child");
                let expected = b"Hello from child!";
                assert_eq!(&view.bytes().unwrap()[..expected.len()], expected);

                assert!(shm.destroy(name.as_str()).unwrap());
                assert!(shm.get(name.as_str(), ElementType::RawBytes).unwrap().is_none());
            }
        }
    }

    #[test]
    fn test_keyed_attach_count_across_processes() {
        if !shm_available() {
            return;
        }
        let key = unique_key();
        let shm = ShmManager::new();
        let mut seg = shm
            .create_keyed(key, 64, ElementType::RawBytes)
            .unwrap()
            .expect("fresh key already taken");
        seg.bytes_mut().unwrap()[0] = 42;

        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                // The fork inherited the parent's attach, so this process
                // already counts once; its own get adds a second attach.
                let child_shm = ShmManager::new();
                let view = child_shm.get(key, ElementType::RawBytes).unwrap().unwrap();
                assert_eq!(view.bytes().unwrap()[0], 42);
                assert_eq!(child_shm.detach(key).unwrap(), Detach::Detached(2));
                std::process::exit(0);
            }
            ForkResult::Parent { child } => {
                let status = waitpid(child, None).unwrap();
                assert!(is_exit_success(status));

                // The child is gone, its inherited attach with it; ours is
                // the last one.
                assert_eq!(shm.detach(key).unwrap(), Detach::Destroyed);
                assert!(shm.get(key, ElementType::RawBytes).unwrap().is_none());
            }
        }
    }

    #[test]
    fn test_exiting_child_does_not_unlink_foreign_names() {
        if !shm_available() {
            return;
        }
        let name = unique_name("keep");
        let shm = ShmManager::new();
        assert!(shm
            .create_named(&name, 256, ElementType::RawBytes)
            .unwrap()
            .is_some());

        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let child_shm = ShmManager::new();
                assert!(child_shm
                    .get(name.as_str(), ElementType::RawBytes)
                    .unwrap()
                    .is_some());
                assert_eq!(
                    child_shm.detach(name.as_str()).unwrap(),
                    Detach::Detached(1)
                );
                std::process::exit(0);
            }
            ForkResult::Parent { child } => {
                let status = waitpid(child, None).unwrap();
                assert!(is_exit_success(status));

                // The child only unmapped; the name must still resolve here.
                let probe = ShmManager::new();
                assert!(probe
                    .get(name.as_str(), ElementType::RawBytes)
                    .unwrap()
                    .is_some());
                assert_eq!(probe.detach(name.as_str()).unwrap(), Detach::Detached(1));
                assert!(shm.destroy(name.as_str()).unwrap());
            }
        }
    }
}
