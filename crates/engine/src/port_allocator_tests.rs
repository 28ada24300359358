// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn allocator(width: u16) -> PortAllocator<AlwaysAvailableProbe> {
    PortAllocator::with_probe(18765, width, AlwaysAvailableProbe)
}

#[tokio::test]
async fn allocates_sequential_triplets() {
    let allocator = allocator(9);
    let first = allocator.allocate().await.unwrap();
    let second = allocator.allocate().await.unwrap();
    assert_eq!(first, PortTriplet { mcp: 18765, desktop: 18766, terminal: 18767 });
    assert_eq!(second, PortTriplet { mcp: 18768, desktop: 18769, terminal: 18770 });
    assert!(!first.overlaps(&second));
}

#[tokio::test]
async fn release_frees_ports_for_reuse() {
    let allocator = allocator(3);
    let triplet = allocator.allocate().await.unwrap();
    assert!(allocator.allocate().await.is_err());
    allocator.release(triplet);
    let reallocated = allocator.allocate().await.unwrap();
    assert_eq!(reallocated, triplet);
}

#[tokio::test]
async fn exhausted_range_errors() {
    let allocator = allocator(3);
    allocator.allocate().await.unwrap();
    let err = allocator.allocate().await.unwrap_err();
    assert!(matches!(err, SandboxError::ResourceExhausted(_)));
}

#[tokio::test]
async fn cursor_wraps_and_never_double_allocates() {
    let allocator = allocator(6);
    let a = allocator.allocate().await.unwrap();
    let b = allocator.allocate().await.unwrap();
    assert!(!a.overlaps(&b));
    allocator.release(a);
    let c = allocator.allocate().await.unwrap();
    assert_eq!(c, a);
}

#[tokio::test]
async fn unavailable_probe_is_skipped() {
    struct BlockSecond;
    #[async_trait::async_trait]
    impl PortProbe for BlockSecond {
        async fn is_available(&self, port: u16) -> bool {
            port < 18768
        }
    }
    let allocator = PortAllocator::with_probe(18765, 6, BlockSecond);
    let err = allocator.allocate().await;
    assert!(err.is_ok());
    let second = allocator.allocate().await;
    assert!(second.is_err());
}

#[tokio::test]
async fn concurrent_allocations_never_overlap() {
    let allocator = std::sync::Arc::new(allocator(30));
    let mut handles = Vec::new();
    for _ in 0..10 {
        let allocator = allocator.clone();
        handles.push(tokio::spawn(async move { allocator.allocate().await.unwrap() }));
    }
    let mut triplets = Vec::new();
    for handle in handles {
        triplets.push(handle.await.unwrap());
    }
    for i in 0..triplets.len() {
        for j in (i + 1)..triplets.len() {
            assert!(!triplets[i].overlaps(&triplets[j]));
        }
    }
}
