use ocr_relay::queue::JobQueue;
use std::path::{Path, PathBuf};

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

#[test]
fn fifo_by_discovery_order() {
    let mut q = JobQueue::new();
    q.push(p("/w/a.pdf"));
    q.push(p("/w/b.pdf"));
    q.push(p("/w/c.pdf"));
    assert_eq!(q.pop_front(), Some(p("/w/a.pdf")));
    assert_eq!(q.pop_front(), Some(p("/w/b.pdf")));
    assert_eq!(q.pop_front(), Some(p("/w/c.pdf")));
    assert_eq!(q.pop_front(), None);
}

#[test]
fn duplicate_push_is_a_no_op() {
    let mut q = JobQueue::new();
    assert!(q.push(p("/w/a.pdf")));
    assert!(!q.push(p("/w/a.pdf")));
    assert_eq!(q.len(), 1);
}

#[test]
fn remove_absent_path_is_a_no_op() {
    let mut q = JobQueue::new();
    q.push(p("/w/a.pdf"));
    assert!(!q.remove(Path::new("/w/missing.pdf")));
    assert_eq!(q.len(), 1);
}

#[test]
fn replace_deduplicates_but_keeps_order() {
    let mut q = JobQueue::new();
    q.push(p("/w/stale.pdf"));
    let n = q.replace(vec![p("/w/a.pdf"), p("/w/b.pdf"), p("/w/a.pdf")]);
    assert_eq!(n, 2);
    assert!(!q.contains(Path::new("/w/stale.pdf")));
    assert_eq!(q.pop_front(), Some(p("/w/a.pdf")));
    assert_eq!(q.pop_front(), Some(p("/w/b.pdf")));
}

#[test]
fn reappearing_path_goes_to_the_back() {
    let mut q = JobQueue::new();
    q.push(p("/w/a.pdf"));
    q.push(p("/w/b.pdf"));
    q.remove(Path::new("/w/a.pdf"));
    q.push(p("/w/a.pdf"));
    assert_eq!(q.pop_front(), Some(p("/w/b.pdf")));
    assert_eq!(q.pop_front(), Some(p("/w/a.pdf")));
}
