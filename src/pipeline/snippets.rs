//! Shader snippets appended to pipelines
//!
//! Each snippet is GLSL text hooked into the vertex or fragment stage of the
//! backend's default program. Snippets run in the order they were added and
//! communicate through varyings and `color_out`.

use crate::backend::{Snippet, SnippetHook};

/// Texture layer sampled as the color source
pub const COLOR_LAYER: u32 = 0;
/// Texture layer holding a material alpha mask
pub const ALPHA_MASK_LAYER: u32 = 1;
/// Texture layer holding a tangent-space normal map
pub const NORMAL_MAP_LAYER: u32 = 2;
/// Texture layer the shadow map is bound to
pub const SHADOW_MAP_LAYER: u32 = 7;

/// Depth bias added to shadow map lookups
pub const SHADOW_BIAS: f32 = 0.0005;
/// Alpha below which shape silhouettes are cut out of depth passes
pub const ALPHA_CUTOFF: f32 = 0.25;

pub const LIGHTING_VERTEX: Snippet = Snippet {
    name: "lighting_vertex",
    hook: SnippetHook::Vertex,
    declarations: r#"
uniform mat3 normal_matrix;
varying vec3 normal, eye_direction;
"#,
    pre: "",
    post: r#"
normal = normalize(normal_matrix * normal_in);
eye_direction = -vec3(modelview_matrix * position_in);
"#,
};

pub const NORMAL_MAP_VERTEX: Snippet = Snippet {
    name: "normal_map_vertex",
    hook: SnippetHook::Vertex,
    declarations: r#"
uniform vec3 light0_direction_norm;
attribute vec3 tangent_in;
varying vec3 light_direction;
"#,
    pre: "",
    post: r#"
vec3 t = normalize(normal_matrix * tangent_in);
vec3 b = cross(normal, t);
light_direction = vec3(dot(light0_direction_norm, t),
                       dot(light0_direction_norm, b),
                       dot(light0_direction_norm, normal));
eye_direction = vec3(dot(eye_direction, t),
                     dot(eye_direction, b),
                     dot(eye_direction, normal));
"#,
};

pub const SHADOW_MAPPING_VERTEX: Snippet = Snippet {
    name: "shadow_mapping_vertex",
    hook: SnippetHook::Vertex,
    declarations: r#"
uniform mat4 light_shadow_matrix;
varying vec4 shadow_coords;
"#,
    pre: "",
    post: r#"
shadow_coords = light_shadow_matrix * position_in;
"#,
};

pub const UNBLENDED_DISCARD: Snippet = Snippet {
    name: "unblended_discard",
    hook: SnippetHook::Fragment,
    declarations: "",
    pre: "",
    post: r#"
if (color_out.a < 1.0)
  discard;
"#,
};

pub const BLENDED_DISCARD: Snippet = Snippet {
    name: "blended_discard",
    hook: SnippetHook::Fragment,
    declarations: "",
    pre: "",
    post: r#"
if (color_out.a <= 0.0 || color_out.a >= 1.0)
  discard;
"#,
};

pub const UNPREMULTIPLY: Snippet = Snippet {
    name: "unpremultiply",
    hook: SnippetHook::Fragment,
    declarations: "",
    pre: "",
    post: "color_out.rgb /= color_out.a;\n",
};

pub const ALPHA_MASK: Snippet = Snippet {
    name: "alpha_mask",
    hook: SnippetHook::Fragment,
    declarations: "uniform float material_alpha_threshold;\n",
    pre: "",
    post: r#"
if (texture2D(sampler1, tex_coord1_in.st).a <= material_alpha_threshold)
  discard;
"#,
};

pub const NORMAL_MAP_FRAGMENT: Snippet = Snippet {
    name: "normal_map_fragment",
    hook: SnippetHook::Fragment,
    declarations: r#"
uniform vec4 light0_ambient, light0_diffuse, light0_specular;
uniform vec4 material_ambient, material_diffuse, material_specular;
uniform float material_shininess;
varying vec3 light_direction, eye_direction;
"#,
    pre: "",
    post: r#"
vec4 lit = light0_ambient * material_ambient * color_out;
vec3 L = normalize(light_direction);
vec3 N = normalize(texture2D(sampler2, tex_coord2_in.st).rgb * 2.0 - 1.0);
float lambert = dot(N, L);
if (lambert > 0.0) {
  lit += light0_diffuse * material_diffuse * color_out * lambert;
  vec3 R = reflect(-L, N);
  float highlight = pow(max(dot(R, normalize(eye_direction)), 0.0), material_shininess);
  lit += light0_specular * material_specular * highlight;
}
color_out.rgb = lit.rgb;
"#,
};

pub const MATERIAL_LIGHTING: Snippet = Snippet {
    name: "material_lighting",
    hook: SnippetHook::Fragment,
    declarations: r#"
uniform vec4 light0_ambient, light0_diffuse, light0_specular;
uniform vec3 light0_direction_norm;
uniform vec4 material_ambient, material_diffuse, material_specular;
uniform float material_shininess;
varying vec3 normal, eye_direction;
"#,
    pre: "",
    post: r#"
vec4 lit = light0_ambient * material_ambient * color_out;
vec3 L = light0_direction_norm;
vec3 N = normalize(normal);
float lambert = dot(N, L);
if (lambert > 0.0) {
  lit += light0_diffuse * material_diffuse * color_out * lambert;
  vec3 R = reflect(-L, N);
  float highlight = pow(max(dot(R, normalize(eye_direction)), 0.0), material_shininess);
  lit += light0_specular * material_specular * highlight;
}
color_out.rgb = lit.rgb;
"#,
};

pub const SIMPLE_LIGHTING: Snippet = Snippet {
    name: "simple_lighting",
    hook: SnippetHook::Fragment,
    declarations: r#"
uniform vec4 light0_ambient, light0_diffuse, light0_specular;
uniform vec3 light0_direction_norm;
varying vec3 normal, eye_direction;
"#,
    pre: "",
    post: r#"
vec4 lit = light0_ambient * color_out;
vec3 L = light0_direction_norm;
vec3 N = normalize(normal);
float lambert = dot(N, L);
if (lambert > 0.0) {
  lit += color_out * light0_diffuse * lambert;
  vec3 R = reflect(-L, N);
  float highlight = pow(max(dot(R, normalize(eye_direction)), 0.0), 2.0);
  lit += light0_specular * vec4(0.6, 0.6, 0.6, 1.0) * highlight;
}
color_out.rgb = lit.rgb;
"#,
};

pub const SHADOW_MAPPING_FRAGMENT: Snippet = Snippet {
    name: "shadow_mapping_fragment",
    hook: SnippetHook::Fragment,
    declarations: "varying vec4 shadow_coords;\n",
    pre: "",
    post: r#"
float occluder = texture2D(sampler7, shadow_coords.xy).z + 0.0005;
float shadow = occluder < shadow_coords.z ? 0.5 : 1.0;
color_out.rgb *= shadow;
"#,
};

pub const PREMULTIPLY: Snippet = Snippet {
    name: "premultiply",
    hook: SnippetHook::Fragment,
    declarations: "",
    pre: "",
    post: "color_out.rgb *= color_out.a;\n",
};

/// Blur factor from the distance to the focal plane, in eye space
pub const DOF_BLUR: Snippet = Snippet {
    name: "dof_blur",
    hook: SnippetHook::Vertex,
    declarations: r#"
uniform float dof_focal_distance;
uniform float dof_depth_of_field;
varying float dof_blur;
"#,
    pre: "",
    post: r#"
vec4 eye_pos = modelview_matrix * position_in;
dof_blur = 1.0 - clamp(abs(eye_pos.z - dof_focal_distance) /
                       dof_depth_of_field, 0.0, 1.0);
"#,
};

pub const DOF_ALPHA: Snippet = Snippet {
    name: "dof_alpha",
    hook: SnippetHook::Fragment,
    declarations: "varying float dof_blur;\n",
    pre: "",
    post: "color_out.a = dof_blur;\n",
};

pub const DIAMOND_MASK: Snippet = Snippet {
    name: "diamond_mask",
    hook: SnippetHook::Fragment,
    declarations: "varying float dof_blur;\n",
    pre: "",
    post: r#"
if (color_out.a <= 0.0)
  discard;
color_out.a = dof_blur;
"#,
};

pub const ALPHA_CUTOFF_MASK: Snippet = Snippet {
    name: "alpha_cutoff",
    hook: SnippetHook::Fragment,
    declarations: "varying float dof_blur;\n",
    pre: "",
    post: r#"
if (color_out.a < 0.25)
  discard;
color_out.a = dof_blur;
"#,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hooks() {
        for snippet in [LIGHTING_VERTEX, NORMAL_MAP_VERTEX, SHADOW_MAPPING_VERTEX, DOF_BLUR] {
            assert_eq!(snippet.hook, SnippetHook::Vertex, "{}", snippet.name);
        }
        for snippet in [UNPREMULTIPLY, PREMULTIPLY, SIMPLE_LIGHTING, DIAMOND_MASK] {
            assert_eq!(snippet.hook, SnippetHook::Fragment, "{}", snippet.name);
        }
    }

    #[test]
    fn test_constants_match_glsl() {
        assert!(SHADOW_MAPPING_FRAGMENT.post.contains("0.0005"));
        assert!(SHADOW_MAPPING_FRAGMENT.post.contains("sampler7"));
        assert_eq!(SHADOW_MAP_LAYER, 7);
        assert!(ALPHA_CUTOFF_MASK.post.contains("0.25"));
        assert!((SHADOW_BIAS - 0.0005).abs() < f32::EPSILON);
        assert!((ALPHA_CUTOFF - 0.25).abs() < f32::EPSILON);
    }
}
