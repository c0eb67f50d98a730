//! Boundary conditions for finite-difference grids.

use serde::{Deserialize, Serialize};

/// A side of a rectangular grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    North,
    East,
    South,
    West,
}

impl Side {
    /// All sides, in the order boundaries are applied.
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];
}

/// How a boundary constrains the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// The edge takes the given value.
    #[default]
    Dirichlet,
    /// The edge is extrapolated from its interior neighbour using the given flux.
    Neumann,
}

/// One side's condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub side: Side,
    pub kind: BoundaryKind,
    pub value: f64,
}

impl Boundary {
    #[must_use]
    pub fn dirichlet(side: Side, value: f64) -> Self {
        Self {
            side,
            kind: BoundaryKind::Dirichlet,
            value,
        }
    }

    #[must_use]
    pub fn neumann(side: Side, flux: f64) -> Self {
        Self {
            side,
            kind: BoundaryKind::Neumann,
            value: flux,
        }
    }

    /// Returns the edge value given the adjacent interior value and spacing.
    #[must_use]
    pub fn edge_value(&self, neighbour: f64, spacing: f64) -> f64 {
        match self.kind {
            BoundaryKind::Dirichlet => self.value,
            BoundaryKind::Neumann => neighbour + self.value * spacing,
        }
    }
}

/// Conditions for all four sides of a grid.
///
/// Each side is typed and valued independently. The default is a
/// zero-valued Dirichlet condition on every side. Serialized sides carry
/// only their kind and value; the key names the side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "SideEdges", into = "SideEdges")]
pub struct BoundaryCondition {
    pub north: Boundary,
    pub east: Boundary,
    pub south: Boundary,
    pub west: Boundary,
}

/// A side's kind and value, keyed by side in [`SideEdges`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Edge {
    kind: BoundaryKind,
    value: f64,
}

impl Edge {
    fn on(self, side: Side) -> Boundary {
        Boundary {
            side,
            kind: self.kind,
            value: self.value,
        }
    }
}

impl From<Boundary> for Edge {
    fn from(boundary: Boundary) -> Self {
        Self {
            kind: boundary.kind,
            value: boundary.value,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct SideEdges {
    north: Edge,
    east: Edge,
    south: Edge,
    west: Edge,
}

impl From<SideEdges> for BoundaryCondition {
    fn from(edges: SideEdges) -> Self {
        Self {
            north: edges.north.on(Side::North),
            east: edges.east.on(Side::East),
            south: edges.south.on(Side::South),
            west: edges.west.on(Side::West),
        }
    }
}

impl From<BoundaryCondition> for SideEdges {
    fn from(bc: BoundaryCondition) -> Self {
        Self {
            north: bc.north.into(),
            east: bc.east.into(),
            south: bc.south.into(),
            west: bc.west.into(),
        }
    }
}

impl Default for BoundaryCondition {
    fn default() -> Self {
        Self::dirichlet(0.0, 0.0, 0.0, 0.0)
    }
}

impl BoundaryCondition {
    /// Fixed values on every side.
    #[must_use]
    pub fn dirichlet(north: f64, east: f64, south: f64, west: f64) -> Self {
        Self {
            north: Boundary::dirichlet(Side::North, north),
            east: Boundary::dirichlet(Side::East, east),
            south: Boundary::dirichlet(Side::South, south),
            west: Boundary::dirichlet(Side::West, west),
        }
    }

    /// Returns the condition for a side.
    #[must_use]
    pub fn side(&self, side: Side) -> &Boundary {
        match side {
            Side::North => &self.north,
            Side::East => &self.east,
            Side::South => &self.south,
            Side::West => &self.west,
        }
    }

    /// Replaces the condition on the boundary's own side.
    #[must_use]
    pub fn with(mut self, boundary: Boundary) -> Self {
        let slot = match boundary.side {
            Side::North => &mut self.north,
            Side::East => &mut self.east,
            Side::South => &mut self.south,
            Side::West => &mut self.west,
        };
        *slot = boundary;
        self
    }

    /// Applies the west and east conditions to the ends of a 1-D field.
    pub fn apply_1d(&self, field: &mut [f64], dx: f64) {
        let n = field.len();
        if n < 2 {
            return;
        }
        field[0] = self.west.edge_value(field[1], dx);
        field[n - 1] = self.east.edge_value(field[n - 2], dx);
    }

    /// Applies all four conditions to a row-major 2-D field.
    ///
    /// Rows run south (`j = 0`) to north; columns west (`i = 0`) to east.
    /// Sides are applied in [`Side::ALL`] order, so east and west own the
    /// corners.
    pub fn apply_2d(&self, field: &mut [f64], nx: usize, ny: usize, dx: f64, dy: f64) {
        if nx < 2 || ny < 2 || field.len() < nx * ny {
            return;
        }
        let at = |i: usize, j: usize| j * nx + i;

        for side in Side::ALL {
            let boundary = self.side(side);
            match side {
                Side::North | Side::South => {
                    let (edge, inner) = if side == Side::North {
                        (ny - 1, ny - 2)
                    } else {
                        (0, 1)
                    };
                    for i in 0..nx {
                        field[at(i, edge)] = boundary.edge_value(field[at(i, inner)], dy);
                    }
                }
                Side::East | Side::West => {
                    let (edge, inner) = if side == Side::East {
                        (nx - 1, nx - 2)
                    } else {
                        (0, 1)
                    };
                    for j in 0..ny {
                        field[at(edge, j)] = boundary.edge_value(field[at(inner, j)], dx);
                    }
                }
            }
        }
    }
}
