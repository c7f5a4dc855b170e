//! Host scripts used by skills

use super::framing::CameraPose;

/// Quick camera adjustments recognized without a model call, checked in order
pub const QUICK_COMMANDS: &[(&str, &str)] = &[
    ("rotate left", "bpy.context.scene.camera.rotation_euler[2] += 0.2"),
    ("rotate right", "bpy.context.scene.camera.rotation_euler[2] -= 0.2"),
    ("zoom in", "bpy.context.scene.camera.location[1] += 2.0"),
    ("zoom out", "bpy.context.scene.camera.location[1] -= 2.0"),
    ("look up", "bpy.context.scene.camera.rotation_euler[0] -= 0.1"),
    ("look down", "bpy.context.scene.camera.rotation_euler[0] += 0.1"),
    ("move up", "bpy.context.scene.camera.location[2] += 1.0"),
    ("move down", "bpy.context.scene.camera.location[2] -= 1.0"),
    ("front view", "bpy.context.scene.camera.rotation_euler = (1.5708, 0, 0)"),
    ("side view", "bpy.context.scene.camera.rotation_euler = (1.5708, 0, 1.5708)"),
    ("top view", "bpy.context.scene.camera.rotation_euler = (0, 0, 0)"),
];

/// Quick command matching `instruction`, if any
pub fn quick_command(instruction: &str) -> Option<(&'static str, String)> {
    let lower = instruction.trim().to_lowercase();
    QUICK_COMMANDS
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(phrase, code)| (*phrase, format!("import bpy\n{}", code)))
}

/// World-space bounds of every mesh plus the active camera's field of view
pub fn scene_bounds() -> String {
    r#"import json

import bpy
import mathutils


def scene_bounds():
    try:
        objects = []
        for obj in bpy.context.scene.objects:
            if obj.type != 'MESH':
                continue
            corners = [obj.matrix_world @ mathutils.Vector(v) for v in obj.bound_box]
            objects.append({
                "name": obj.name,
                "min": [min(c[i] for c in corners) for i in range(3)],
                "max": [max(c[i] for c in corners) for i in range(3)],
            })
        cam = bpy.context.scene.camera
        camera = None
        if cam:
            camera = {"name": cam.name, "fov": getattr(cam.data, "angle", None)}
        return {"status": "success", "objects": objects, "camera": camera}
    except Exception as e:
        return {"status": "error", "message": str(e)}


print(json.dumps(scene_bounds()))
"#
    .to_string()
}

/// Move the active camera to `pose`
pub fn set_camera(pose: &CameraPose) -> String {
    let [x, y, z] = pose.location;
    let [rx, ry, rz] = pose.rotation;
    format!(
        r#"import json

import bpy

cam = bpy.context.scene.camera
if cam:
    cam.location = ({x}, {y}, {z})
    cam.rotation_euler = ({rx}, {ry}, {rz})
    print(json.dumps({{"status": "success", "camera": cam.name}}))
else:
    print(json.dumps({{"status": "error", "message": "No active camera in scene"}}))
"#
    )
}

/// Show or hide an object in viewport and render
pub fn set_visibility(object_name: &str, visible: bool) -> String {
    let name = serde_json::to_string(object_name).unwrap_or_else(|_| "\"\"".to_string());
    let hidden = if visible { "False" } else { "True" };
    format!(
        r#"import json

import bpy

obj = bpy.data.objects.get({name})
if obj:
    obj.hide_viewport = {hidden}
    obj.hide_render = {hidden}
    print(json.dumps({{"status": "success", "object": obj.name}}))
else:
    print(json.dumps({{"status": "error", "message": "Object not found: " + {name}}}))
"#
    )
}
