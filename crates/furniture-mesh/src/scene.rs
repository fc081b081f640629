//! Scene container: named mesh objects with world transforms.

use nalgebra::Matrix4;

use crate::geometry::{compute_bounding_box, BoundingBox};
use crate::Mesh;

/// A mesh placed in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Object name, unique within the scene.
    pub name: String,
    /// Object-to-world transform.
    pub transform: Matrix4<f64>,
    pub mesh: Mesh,
}

impl SceneObject {
    /// Object at the world origin.
    pub fn new(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            name: name.into(),
            transform: Matrix4::identity(),
            mesh,
        }
    }

    pub fn with_transform(mut self, transform: Matrix4<f64>) -> Self {
        self.transform = transform;
        self
    }

    /// World-space bounding box; None for an object without vertices.
    pub fn world_bounds(&self) -> Option<BoundingBox> {
        compute_bounding_box(&self.mesh, &self.transform)
    }
}

/// Ordered collection of mesh objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter()
    }
}

impl FromIterator<SceneObject> for Scene {
    fn from_iter<T: IntoIterator<Item = SceneObject>>(iter: T) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_world_bounds_uses_transform() {
        let mut mesh = Mesh::with_name("seat");
        mesh.push_vertex(0.0, 0.0, 0.0);
        mesh.push_vertex(1.0, 1.0, 1.0);
        let object = SceneObject::new("seat", mesh)
            .with_transform(Matrix4::new_translation(&Vector3::new(0.0, 0.0, 5.0)));

        let bbox = object.world_bounds().expect("vertices");
        assert_relative_eq!(bbox.min.z, 5.0);
        assert_relative_eq!(bbox.max.z, 6.0);
    }

    #[test]
    fn test_scene_lookup() {
        let scene: Scene = ["a", "b"]
            .into_iter()
            .map(|n| SceneObject::new(n, Mesh::with_name(n)))
            .collect();
        assert_eq!(scene.len(), 2);
        assert!(scene.get("b").is_some());
        assert!(scene.get("c").is_none());
        assert!(Scene::new().is_empty());
    }
}
