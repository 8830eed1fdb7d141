//! Kept as the only test in its binary so no other test opens descriptors
//! while the count is taken.

#![cfg(target_os = "linux")]

use std::fs;

use ish::{Config, Flow, Shell};

fn open_fds() -> usize {
	fs::read_dir("/proc/self/fd").unwrap().count()
}

#[test]
fn pipelines_leave_no_open_descriptors() {
	let dir = tempfile::tempdir().unwrap();
	let d = dir.path().to_str().unwrap().to_string();
	fs::write(dir.path().join("in"), "b\na\n").unwrap();
	let mut shell = Shell::new(Config::default());

	let before = open_fds();
	let lines = vec![
		format!("echo hi | cat | cat > {}/out1", d),
		format!("echo hi | ish_no_such_command | cat > {}/out2", d),
		format!("sort < {}/in | uniq | cat > {}/out3", d, d),
		format!("cat < {}/missing | cat > {}/out4", d, d),
		format!("cat < {}/in > {}/out5", d, d),
		"cd /ish/no/such/dir".to_string(),
	];
	for line in &lines {
		assert_eq!(shell.execute_line(line), Flow::Continue);
		assert_eq!(open_fds(), before, "descriptor leaked by {:?}", line);
	}

	assert_eq!(fs::read_to_string(dir.path().join("out1")).unwrap(), "hi\n");
	assert_eq!(fs::read_to_string(dir.path().join("out2")).unwrap(), "");
	assert_eq!(fs::read_to_string(dir.path().join("out3")).unwrap(), "a\nb\n");
	assert!(!dir.path().join("out4").exists());
	assert_eq!(fs::read_to_string(dir.path().join("out5")).unwrap(), "b\na\n");
}
