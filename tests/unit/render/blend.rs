use super::*;

#[test]
fn over_opacity_0_is_noop() {
    let dst = [1, 2, 3, 4];
    let src = [200, 200, 200, 200];
    assert_eq!(over(dst, src, 0.0), dst);
    assert_eq!(over(dst, src, f32::NAN), dst);
}

#[test]
fn over_src_opaque_replaces_dst() {
    let dst = [0, 0, 0, 255];
    let src = [255, 0, 0, 255];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn over_half_opacity_on_transparent_scales_src() {
    assert_eq!(over([0, 0, 0, 0], [255, 0, 0, 255], 0.5), [128, 0, 0, 128]);
}

#[test]
fn over_at_ignores_out_of_range_offsets() {
    let mut buf = vec![0u8; 4];
    over_at(&mut buf, 4, [255, 255, 255, 255], 1.0);
    assert_eq!(buf, vec![0, 0, 0, 0]);
    over_at(&mut buf, 0, [255, 255, 255, 255], 1.0);
    assert_eq!(buf, vec![255, 255, 255, 255]);
}
