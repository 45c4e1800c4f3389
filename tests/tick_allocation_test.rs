use std::{
    alloc::{GlobalAlloc, Layout, System},
    sync::atomic::{AtomicUsize, Ordering},
};

use instant::Duration;
use splat_roam::{KeyCode, camera::NavigationController};
use winit::event::ElementState;

struct CountingAllocator;

static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Ordering::SeqCst);
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

// The only test in this binary, so no other thread allocates while it counts.
#[test]
fn ticking_with_held_keys_does_not_allocate() {
    let mut controller = NavigationController::default();
    controller.set_pointer_locked(true);
    controller.handle_key(KeyCode::KeyW, ElementState::Pressed, false);
    controller.handle_key(KeyCode::KeyD, ElementState::Pressed, false);
    controller.input().pointer_moved(4.0, 2.0);
    let start = controller.pose().position;

    let before = ALLOCATIONS.load(Ordering::SeqCst);
    for _ in 0..100 {
        controller.tick(Duration::from_millis(16));
    }
    let allocated = ALLOCATIONS.load(Ordering::SeqCst) - before;

    assert_eq!(allocated, 0);
    let end = controller.pose().position;
    assert!(end.z < start.z);
    assert!(end.x > start.x);
}
