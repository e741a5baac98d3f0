//! Integration tests for the machine registry.

use vmxman::{
    BusType, HardDisk, HardDiskType, MachineManager, ManagerEvent, Progress, SlotCoordinate,
    VmxError,
};
use vmxman_test_utils::{MIB, TestHome};

#[test]
fn test_empty_home() {
    let home = TestHome::new();
    let manager = home.manager();
    assert!(manager.machines().is_empty());
    assert!(home.path().join("machines").is_dir());
    assert!(home.path().join(".lock").exists());
}

#[test]
fn test_machines_survive_reopen() {
    let home = TestHome::new();
    {
        let mut manager = home.manager();
        manager.create_machine("one").unwrap();
        let vm = manager.create_machine("two").unwrap();
        vm.add_hard_disk(HardDisk::new(
            SlotCoordinate::new(BusType::Ide, 0, 0).unwrap(),
            HardDiskType::SplitSparse,
            MIB,
        ));
        vm.save(&mut Progress::none()).unwrap();
    }

    let manager = home.manager();
    let names: Vec<&str> = manager.machines().iter().map(|vm| vm.name()).collect();
    assert_eq!(names, vec!["one", "two"]);
    assert_eq!(manager.get_machine("two").unwrap().hard_disks().len(), 1);
}

#[test]
fn test_events_for_add_and_remove() {
    let home = TestHome::new();
    let mut manager = home.manager();
    let mut events = manager.subscribe();

    manager.create_machine("evt").unwrap();
    manager.remove_machine("evt", true).unwrap();

    assert!(matches!(events.try_recv(), Ok(ManagerEvent::Added { .. })));
    assert!(matches!(events.try_recv(), Ok(ManagerEvent::Removed { name, .. }) if name == "evt"));
}

#[test]
fn test_remove_unknown_machine() {
    let home = TestHome::new();
    let mut manager = home.manager();
    assert!(matches!(
        manager.remove_machine("nobody", false),
        Err(VmxError::NotFound(_))
    ));
}

#[test]
fn test_create_from_iso_named_explicitly() {
    let home = TestHome::new();
    let iso = home.write_iso("netinst.iso");
    let mut manager = home.manager();

    let vm = manager.create_machine_from_iso(&iso, Some("installer")).unwrap();
    assert_eq!(vm.name(), "installer");
    assert_eq!(vm.get("ide1:0.deviceType"), Some("cdrom-image"));
}

#[test]
fn test_home_is_exclusive() {
    let home = TestHome::new();
    let _manager = home.manager();
    assert!(MachineManager::new(home.options()).is_err());
}
