//! Tests for color scales and grid colorization.

use atlas_common::PhysicalQuantity;
use renderer::gradient::{
    hue_ramp, interpolate_color, lst_kelvin_ramp, render_grid, Color, ColorScale,
};
use test_utils::{create_lst_grid, punch_holes};

// ============================================================================
// interpolate_color tests
// ============================================================================

#[test]
fn test_interpolate_endpoints() {
    let a = Color::rgb(10, 20, 30);
    let b = Color::rgb(200, 100, 0);
    assert_eq!(interpolate_color(a, b, 0.0), a);
    assert_eq!(interpolate_color(a, b, 1.0), b);
}

#[test]
fn test_interpolate_clamps_t() {
    let a = Color::rgb(0, 0, 0);
    let b = Color::rgb(255, 255, 255);
    assert_eq!(interpolate_color(a, b, -3.0), a);
    assert_eq!(interpolate_color(a, b, 7.5), b);
}

// ============================================================================
// Nodata transparency
// ============================================================================

#[test]
fn test_alpha_zero_iff_nodata() {
    let width = 12;
    let height = 8;
    let data = punch_holes(create_lst_grid(width, height), 5, f32::NAN);

    for scale in [
        ColorScale::fixed(PhysicalQuantity::LandSurfaceTemperature),
        ColorScale::dynamic(292.0, 318.0),
    ] {
        let pixels = scale.render(&data, width, height);
        assert_eq!(pixels.len(), width * height * 4);

        for (i, value) in data.iter().enumerate() {
            let alpha = pixels[i * 4 + 3];
            if value.is_nan() {
                assert_eq!(alpha, 0, "nodata pixel {} must be transparent", i);
            } else {
                assert_eq!(alpha, 255, "valid pixel {} must be opaque", i);
            }
        }
    }
}

#[test]
fn test_extreme_valid_values_are_opaque() {
    let scale = ColorScale::fixed(PhysicalQuantity::LandSurfaceTemperature);
    assert_eq!(scale.color_for(-1.0e9).a, 255);
    assert_eq!(scale.color_for(1.0e9).a, 255);
    assert_eq!(scale.color_for(f32::NAN).a, 0);
}

// ============================================================================
// Clamping to terminal colors
// ============================================================================

#[test]
fn test_dynamic_scale_clamps() {
    let scale = ColorScale::dynamic(300.0, 310.0);
    let ramp = hue_ramp();
    let low = ramp.stops()[0].color;
    let high = ramp.stops()[ramp.stops().len() - 1].color;

    assert_eq!(scale.color_for(250.0), low);
    assert_eq!(scale.color_for(300.0), low);
    assert_eq!(scale.color_for(310.0), high);
    assert_eq!(scale.color_for(395.0), high);
}

#[test]
fn test_fixed_scale_clamps() {
    let scale = ColorScale::fixed(PhysicalQuantity::LandSurfaceTemperature);
    let ramp = lst_kelvin_ramp();
    let low = ramp.stops()[0].color;
    let high = ramp.stops()[ramp.stops().len() - 1].color;

    assert_eq!(scale.color_for(201.0), low);
    assert_eq!(scale.color_for(399.0), high);
}

#[test]
fn test_dynamic_scale_flat_range() {
    let scale = ColorScale::dynamic(305.0, 305.0);
    let mid = hue_ramp().color_at(0.5);
    assert_eq!(scale.color_for(305.0), mid);
    assert_eq!(scale.color_for(400.0), mid);
}

#[test]
fn test_dynamic_scale_is_monotonic_in_hue_order() {
    // Blue dominates the cold end, red the warm end
    let scale = ColorScale::dynamic(0.0, 1.0);
    let cold = scale.color_for(0.05);
    let warm = scale.color_for(0.85);
    assert!(cold.b > cold.r);
    assert!(warm.r > warm.b);
}

#[test]
fn test_scale_range() {
    assert_eq!(ColorScale::dynamic(1.0, 2.0).range(), (1.0, 2.0));
    assert_eq!(
        ColorScale::fixed(PhysicalQuantity::Precipitation).range(),
        (0.0, 150.0)
    );
}

// ============================================================================
// render_grid tests
// ============================================================================

#[test]
fn test_render_grid_short_data_stays_transparent() {
    let data = vec![1.0f32; 3];
    let pixels = render_grid(&data, 2, 2, |_| Color::rgb(255, 0, 0));
    assert_eq!(&pixels[0..4], &[255, 0, 0, 255]);
    assert_eq!(&pixels[12..16], &[0, 0, 0, 0]);
}

#[test]
fn test_render_grid_zero_size() {
    assert!(render_grid(&[], 0, 0, |_| Color::rgb(1, 1, 1)).is_empty());
}
