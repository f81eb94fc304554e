//! End-to-end: producer, update driver and a live render thread.

use std::thread;
use std::time::Duration;

use stagecraft_core::PropertyType;
use stagecraft_render::{
    BackendCall, RecordingBackend, RenderThread, RendererDesc, TextureData, TextureState,
};
use stagecraft_shared::math::Vec3;
use stagecraft_update::{
    Animation, AttachmentDesc, CoreConfig, Easing, EndAction, KeepUpdating, KeyFrames, NodeDesc,
    Notification, PropertyIndex, SceneError, Stage,
};

fn x_of(stage: &Stage, node: stagecraft_update::NodeId) -> f32 {
    stage
        .update
        .property_value(node, PropertyIndex::POSITION)
        .and_then(|v| v.get::<Vec3>())
        .map_or(f32::NAN, |p| p.x)
}

/// Updates once and renders the batch on this thread.
fn tick(stage: &mut Stage, elapsed_seconds: f32) -> stagecraft_update::UpdateStatus {
    stage.controller.flush();
    let status = stage.update.update(elapsed_seconds);
    let mut batch = stage.receiver.try_recv().expect("one batch per update");
    stage.render.render(&mut batch);
    stage.receiver.recycle(batch.messages);
    status
}

#[test]
fn test_animation_bakes_each_frame_and_finishes() {
    let mut stage = Stage::new(&CoreConfig::default(), RecordingBackend::new()).unwrap();
    let node = stage.controller.add_node(NodeDesc::new());
    let animation = stage
        .controller
        .add_animation(Animation::new(1.0).animate_to(
            node,
            PropertyIndex::POSITION,
            Vec3::new(10.0, 0.0, 0.0).into_value(),
            Easing::Linear,
        ))
        .unwrap();
    stage.controller.play(animation).unwrap();

    let status = tick(&mut stage, 0.25);
    assert!(status.keep_updating.contains(KeepUpdating::ANIMATIONS_RUNNING));
    assert!((x_of(&stage, node) - 2.5).abs() < 1e-4);
    tick(&mut stage, 0.25);
    assert!((x_of(&stage, node) - 5.0).abs() < 1e-4);
    tick(&mut stage, 0.25);
    let status = tick(&mut stage, 0.25);
    assert!(!status.keep_updating.contains(KeepUpdating::ANIMATIONS_RUNNING));
    assert!((x_of(&stage, node) - 10.0).abs() < 1e-4);
    assert_eq!(
        stage.controller.poll_notifications(),
        vec![Notification::AnimationFinished(animation)]
    );

    // Baked: still there once the scene settles.
    for _ in 0..3 {
        tick(&mut stage, 0.25);
    }
    assert!((x_of(&stage, node) - 10.0).abs() < 1e-4);
}

#[test]
fn test_discard_animation_reverts_after_stop() {
    let mut stage = Stage::new(&CoreConfig::default(), RecordingBackend::new()).unwrap();
    let node = stage.controller.add_node(NodeDesc::new());
    let frames = KeyFrames::new()
        .with(0.0, Vec3::ZERO.into_value())
        .with(1.0, Vec3::new(4.0, 0.0, 0.0).into_value());
    let animation = stage
        .controller
        .add_animation(
            Animation::new(2.0)
                .with_loop_count(0)
                .with_end_action(EndAction::Discard)
                .animate_between(node, PropertyIndex::POSITION, frames, Easing::Linear),
        )
        .unwrap();
    stage.controller.play(animation).unwrap();
    tick(&mut stage, 1.0);
    assert!((x_of(&stage, node) - 2.0).abs() < 1e-4);

    stage.controller.stop(animation).unwrap();
    for _ in 0..3 {
        tick(&mut stage, 0.1);
    }
    assert_eq!(x_of(&stage, node), 0.0);
}

#[test]
fn test_producer_validates_animations() {
    let mut stage = Stage::new(&CoreConfig::default(), RecordingBackend::new()).unwrap();
    let node = stage.controller.add_node(NodeDesc::new());
    let wrong = Animation::new(1.0).animate_to(
        node,
        PropertyIndex::POSITION,
        1.0_f32.into_value(),
        Easing::Linear,
    );
    assert!(matches!(
        stage.controller.add_animation(wrong),
        Err(SceneError::PropertyTypeMismatch { .. })
    ));
    let empty =
        Animation::new(1.0).animate_between(node, PropertyIndex::SCALE, KeyFrames::new(), Easing::Linear);
    assert_eq!(
        stage.controller.add_animation(empty).err(),
        Some(SceneError::EmptyKeyFrames(node))
    );
    assert!(stage.controller.play(stagecraft_update::AnimationId(42)).is_err());
}

#[test]
fn test_frames_reach_the_render_thread() {
    let backend = RecordingBackend::new();
    let Stage {
        mut controller,
        mut update,
        render,
        receiver,
    } = Stage::new(&CoreConfig::default(), backend.clone()).unwrap();
    let render = RenderThread::spawn(render, receiver).expect("spawn render thread");

    let texture = controller.create_texture();
    controller
        .upload_texture(
            texture.id(),
            TextureData {
                width: 2,
                height: 2,
                pixels: vec![255; 16],
            },
        )
        .unwrap();

    let root = controller.add_node(NodeDesc::new().with_position(Vec3::new(1.0, 0.0, 0.0)));
    let textured = controller.add_node(NodeDesc::new());
    let plain = controller.add_node(NodeDesc::new().with_position(Vec3::new(0.0, 2.0, 0.0)));
    let camera = controller.add_node(NodeDesc::new());
    controller.connect(root, textured).unwrap();
    controller.connect(root, plain).unwrap();
    controller
        .set_attachment(
            textured,
            AttachmentDesc::Renderable {
                desc: RendererDesc::default(),
                texture: Some(texture.id()),
                depth_index: 1,
            },
        )
        .unwrap();
    controller
        .set_attachment(
            plain,
            AttachmentDesc::Renderable {
                desc: RendererDesc::default(),
                texture: None,
                depth_index: 0,
            },
        )
        .unwrap();
    controller.set_attachment(camera, AttachmentDesc::Camera).unwrap();
    let tracker = controller.create_tracker();
    controller.flush();

    let mut settled = false;
    for _ in 0..500 {
        let status = update.update(0.016);
        if status.keep_updating.is_empty() && !status.scene_updated {
            settled = true;
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert!(settled, "pipeline never went idle");
    assert_eq!(texture.state(), TextureState::Ready);
    assert!(tracker.is_synced());
    assert_eq!(update.scene().renderer_pool().len(), 2);

    // Destroying the subtree releases both renderers on the render thread.
    controller.destroy_node(root).unwrap();
    controller.flush();
    update.update(0.016);
    update.update(0.016);

    drop(update);
    let manager = render.join().expect("render thread panicked");
    assert_eq!(manager.stats().backend_errors, 0);
    assert!(manager.stats().frames_rendered > 0);
    assert!(manager.renderer_pool().is_empty());

    let calls = backend.calls();
    let created = calls
        .iter()
        .filter(|c| matches!(c, BackendCall::CreateRenderer(_)))
        .count();
    let destroyed = calls
        .iter()
        .filter(|c| matches!(c, BackendCall::DestroyRenderer(_)))
        .count();
    assert_eq!((created, destroyed), (2, 2));
    // The textured item is drawn once its texture is ready.
    assert!(calls
        .iter()
        .any(|c| matches!(c, BackendCall::Draw(command) if command.texture.is_some())));
}

#[test]
fn test_unknown_targets_are_rejected_before_queueing() {
    let mut stage = Stage::new(&CoreConfig::default(), RecordingBackend::new()).unwrap();
    let node = stage.controller.add_node(NodeDesc::new());
    stage.controller.flush();
    let ghost = stagecraft_update::NodeId(404);

    assert_eq!(
        stage.controller.destroy_node(ghost),
        Err(SceneError::UnknownNode(ghost))
    );
    assert!(matches!(
        stage.controller.connect(node, node),
        Err(SceneError::HierarchyCycle { .. })
    ));
    assert!(matches!(
        stage
            .controller
            .set_property(node, PropertyIndex::custom(3), 1.0_f32.into_value()),
        Err(SceneError::UnknownProperty { .. })
    ));
    assert!(matches!(
        stage.controller.set_attachment(
            node,
            AttachmentDesc::Renderable {
                desc: RendererDesc::default(),
                texture: Some(stagecraft_render::TextureId(9)),
                depth_index: 0,
            },
        ),
        Err(SceneError::UnknownTexture(_))
    ));
    assert_eq!(stage.controller.pending_messages(), 0);
}
