use crate::datatypes::ElementType;

/// A tensor-product Gauss point in natural coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussPoint {
    pub xi: f64,
    pub eta: f64,
    pub w_xi: f64,
    pub w_eta: f64,
}

impl GaussPoint {
    const fn new(xi: f64, eta: f64, w_xi: f64, w_eta: f64) -> GaussPoint {
        GaussPoint {
            xi,
            eta,
            w_xi,
            w_eta,
        }
    }

    pub fn weight(&self) -> f64 {
        self.w_xi * self.w_eta
    }
}

// 1/sqrt(3)
const G2: f64 = 0.577_350_269_189_625_8;
// sqrt(3/5)
const G3: f64 = 0.774_596_669_241_483_4;
const W3_END: f64 = 5.0 / 9.0;
const W3_MID: f64 = 8.0 / 9.0;

const GAUSS_2X2: [GaussPoint; 4] = [
    GaussPoint::new(-G2, -G2, 1.0, 1.0),
    GaussPoint::new(G2, -G2, 1.0, 1.0),
    GaussPoint::new(G2, G2, 1.0, 1.0),
    GaussPoint::new(-G2, G2, 1.0, 1.0),
];

const GAUSS_3X3: [GaussPoint; 9] = [
    GaussPoint::new(-G3, -G3, W3_END, W3_END),
    GaussPoint::new(0.0, -G3, W3_MID, W3_END),
    GaussPoint::new(G3, -G3, W3_END, W3_END),
    GaussPoint::new(-G3, 0.0, W3_END, W3_MID),
    GaussPoint::new(0.0, 0.0, W3_MID, W3_MID),
    GaussPoint::new(G3, 0.0, W3_END, W3_MID),
    GaussPoint::new(-G3, G3, W3_END, W3_END),
    GaussPoint::new(0.0, G3, W3_MID, W3_END),
    GaussPoint::new(G3, G3, W3_END, W3_END),
];

/// Returns the Gauss integration scheme used by an element type
///
/// # Arguments
/// * `element_type` - The element family
///
/// # Returns
/// An ordered slice of gauss points. 2x2 for the 4-node families, 3x3 for
/// the 8-node family
pub fn gauss_points(element_type: ElementType) -> &'static [GaussPoint] {
    match element_type {
        ElementType::Quad4 | ElementType::Quad4Incompatible => &GAUSS_2X2,
        ElementType::Quad8 => &GAUSS_3X3,
    }
}
