//! Python scripts run inside the host to query or reset the scene
//!
//! Each script prints a single JSON object on stdout.

/// Capture the 3D viewport as a base64 PNG no larger than `max_size`
pub fn capture_viewport(max_size: u32) -> String {
    format!(
        r#"import base64
import io
import json
import os
import tempfile

import bpy
from PIL import Image


def capture_viewport():
    try:
        for area in bpy.context.screen.areas:
            if area.type == 'VIEW_3D':
                filepath = os.path.join(tempfile.gettempdir(), "sceneloop_viewport.png")
                with bpy.context.temp_override(area=area):
                    bpy.ops.screen.screenshot_area(filepath=filepath)
                img = Image.open(filepath)
                img.thumbnail(({max_size}, {max_size}), Image.LANCZOS)
                buffer = io.BytesIO()
                img.save(buffer, format='PNG')
                return {{
                    "status": "success",
                    "image_data": base64.b64encode(buffer.getvalue()).decode(),
                    "format": "png",
                    "width": img.width,
                    "height": img.height,
                }}
        return {{"status": "error", "message": "No 3D viewport found"}}
    except Exception as e:
        return {{"status": "error", "message": str(e)}}


print(json.dumps(capture_viewport()))
"#
    )
}

/// Summarize objects, lights, cameras and materials
pub fn scene_info() -> String {
    r#"import json

import bpy


def get_scene_info():
    try:
        info = {"objects": [], "materials": [], "lights": [], "cameras": []}
        for obj in bpy.data.objects:
            obj_data = {
                "name": obj.name,
                "type": obj.type,
                "location": list(obj.location),
                "rotation": list(obj.rotation_euler),
                "scale": list(obj.scale),
            }
            if obj.type == 'MESH':
                info["objects"].append(obj_data)
            elif obj.type == 'LIGHT':
                obj_data["energy"] = obj.data.energy
                obj_data["light_type"] = obj.data.type
                info["lights"].append(obj_data)
            elif obj.type == 'CAMERA':
                obj_data["lens"] = obj.data.lens
                info["cameras"].append(obj_data)
        for mat in bpy.data.materials:
            info["materials"].append({"name": mat.name, "use_nodes": mat.use_nodes})
        return {"status": "success", "scene_info": info}
    except Exception as e:
        return {"status": "error", "message": str(e)}


print(json.dumps(get_scene_info()))
"#
    .to_string()
}

/// Delete scene objects, keeping lights and optionally cameras
pub fn clear_scene(keep_camera: bool) -> String {
    let keep_types = if keep_camera { "'CAMERA', 'LIGHT'" } else { "'LIGHT'" };
    format!(
        r#"import json

import bpy


def clear_scene():
    try:
        bpy.ops.object.select_all(action='DESELECT')
        for obj in bpy.data.objects:
            if obj.type not in [{keep_types}]:
                obj.select_set(True)
        bpy.ops.object.delete()
        bpy.ops.outliner.orphans_purge(do_local_ids=True, do_linked_ids=True, do_recursive=True)
        return {{"status": "success", "message": "Scene cleared"}}
    except Exception as e:
        return {{"status": "error", "message": str(e)}}


print(json.dumps(clear_scene()))
"#
    )
}
