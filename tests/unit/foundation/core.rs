use super::*;

#[test]
fn transparent_frame_has_expected_len() {
    let f = FrameRGBA::transparent(Canvas {
        width: 3,
        height: 2,
    });
    assert_eq!(f.data.len(), 24);
    assert!(f.premultiplied);
    assert_eq!(f.pixel(2, 1), Some([0, 0, 0, 0]));
    assert_eq!(f.pixel(3, 0), None);
}

#[test]
fn copy_from_clips_at_edges() {
    let mut dst = FrameRGBA::transparent(Canvas {
        width: 4,
        height: 4,
    });
    let src = FrameRGBA {
        width: 2,
        height: 2,
        data: vec![9; 16],
        premultiplied: true,
    };
    dst.copy_from(&src, 3, 3);
    assert_eq!(dst.pixel(3, 3), Some([9, 9, 9, 9]));
    assert_eq!(dst.pixel(2, 3), Some([0, 0, 0, 0]));
    dst.copy_from(&src, 9, 0);
    assert_eq!(dst.data.iter().filter(|b| **b == 9).count(), 4);
}

#[test]
fn straight_alpha_undoes_premultiplication() {
    let f = FrameRGBA {
        width: 1,
        height: 1,
        data: vec![64, 0, 128, 128],
        premultiplied: true,
    };
    assert_eq!(f.to_straight_alpha(), vec![128, 0, 255, 128]);
}
