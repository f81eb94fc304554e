//! Integration test for the render thread.

use std::sync::Arc;

use stagecraft_core::{BufferIndex, PoolConfig, SceneGraphBuffers, ThreadSafePool};
use stagecraft_render::{
    render_channel, BackendCall, RecordingBackend, RenderConfig, RenderInstruction, RenderItem,
    RenderManager, RenderQueue, RenderRenderer, RenderThread, RenderTracker, RendererDesc,
    TextureData, TextureId, TextureResource, TextureState,
};
use stagecraft_shared::math::{Matrix4, Vec3, Vec4};

fn item(renderer: stagecraft_core::PoolKey, x: f32, depth_index: i32) -> RenderItem {
    RenderItem {
        renderer,
        texture: None,
        world_matrix: Matrix4::from_trs(
            Vec3::new(x, 0.0, 0.0),
            stagecraft_shared::math::Quaternion::IDENTITY,
            Vec3::ONE,
        ),
        color: Vec4::ONE,
        depth_index,
    }
}

#[test]
fn test_render_thread_applies_batches_in_order() {
    let backend = RecordingBackend::new();
    let pool = Arc::new(ThreadSafePool::new(PoolConfig::default()));
    let manager = RenderManager::new(backend.clone(), Arc::clone(&pool));
    let (mut dispatcher, receiver) = render_channel(RenderConfig::default());
    let render = RenderThread::spawn(manager, receiver).expect("spawn render thread");

    let mut buffers = SceneGraphBuffers::new();
    let mut queue = RenderQueue::new(1024);
    let tracker = RenderTracker::new();
    let texture = TextureResource::new(TextureId(1));

    // Frame 1: resources arrive, nothing to draw yet.
    let key = pool.allocate_thread_safe(RenderRenderer::new(RendererDesc::default()));
    let index = buffers.update_index();
    queue.add_renderer(index, key);
    queue.add_texture(index, Arc::clone(&texture));
    queue.upload_texture(
        index,
        TextureId(1),
        TextureData {
            width: 2,
            height: 1,
            pixels: vec![0; 8],
        },
    );
    let read = buffers.swap().other();
    assert!(dispatcher.dispatch(&mut queue, 1, read, false));

    // Frame 2: draw two items, out of depth order.
    let index = buffers.update_index();
    let mut instruction = RenderInstruction::new(2);
    instruction.items = vec![item(key, 2.0, 5), item(key, 1.0, 0)];
    instruction.sort_items();
    queue.set_instruction(index, instruction);
    queue.add_tracker(index, tracker.clone());
    let read = buffers.swap().other();
    assert!(dispatcher.dispatch(&mut queue, 2, read, true));

    // Frame 3: renderer removed.
    let index = buffers.update_index();
    queue.remove_renderer(index, key);
    let read = buffers.swap().other();
    assert!(dispatcher.dispatch(&mut queue, 3, read, false));

    drop(dispatcher);
    let manager = render.join().expect("render thread panicked");

    assert_eq!(texture.state(), TextureState::Ready);
    assert!(tracker.is_synced());
    assert!(pool.is_empty());
    assert_eq!(manager.stats().frames_rendered, 1);
    assert_eq!(manager.stats().frames_skipped, 2);
    assert_eq!(manager.stats().backend_errors, 0);

    let draws: Vec<f32> = backend
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BackendCall::Draw(command) => Some(command.uniforms.model_view.translation().x),
            _ => None,
        })
        .collect();
    assert_eq!(draws, [1.0, 2.0]);
    assert!(matches!(
        backend.calls().last(),
        Some(BackendCall::DestroyRenderer(_))
    ));
}

#[test]
fn test_backend_failures_are_counted_not_fatal() {
    let backend = RecordingBackend::new();
    let pool = Arc::new(ThreadSafePool::new(PoolConfig::default()));
    let manager = RenderManager::new(backend.clone(), Arc::clone(&pool));
    let (mut dispatcher, receiver) = render_channel(RenderConfig::default());
    let render = RenderThread::spawn(manager, receiver).expect("spawn render thread");

    let mut queue = RenderQueue::new(256);
    backend.set_device_lost(true);
    for frame in 0..3 {
        let index = if frame % 2 == 0 {
            BufferIndex::ZERO
        } else {
            BufferIndex::ONE
        };
        queue.set_instruction(index, RenderInstruction::new(frame));
        assert!(dispatcher.dispatch(&mut queue, frame, index, true));
    }
    drop(dispatcher);

    let manager = render.join().expect("render thread survives backend errors");
    assert_eq!(manager.stats().frames_rendered, 0);
    assert_eq!(manager.stats().backend_errors, 3);
}
