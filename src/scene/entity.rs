//! Entities and their components

use crate::backend::{PipelineHandle, PrimitiveHandle};
use crate::pipeline::PipelineSlot;
use crate::resources::{Material, TextureAsset};

use super::{Camera, Geometry, Light};

/// Kind of a [`Component`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Geometry,
    Material,
    Light,
    Camera,
}

/// A typed attachment to an entity
#[derive(Debug, Clone)]
pub enum Component {
    Geometry(Geometry),
    Material(Material),
    Light(Light),
    Camera(Camera),
}

impl Component {
    pub fn component_type(&self) -> ComponentType {
        match self {
            Component::Geometry(_) => ComponentType::Geometry,
            Component::Material(_) => ComponentType::Material,
            Component::Light(_) => ComponentType::Light,
            Component::Camera(_) => ComponentType::Camera,
        }
    }

    /// Components that change what a color pipeline is built from
    fn affects_pipeline(&self) -> bool {
        matches!(self, Component::Geometry(_) | Component::Material(_))
    }
}

/// Pipeline cached on an entity for one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedPipeline {
    pub handle: PipelineHandle,
    /// Entity content generation the pipeline was built from
    pub generation: u64,
}

/// Backend object the entity no longer uses and that must be released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetiredResource {
    Pipeline(PipelineHandle),
    Primitive(PrimitiveHandle),
}

/// Scene node payload holding at most one component of each type
#[derive(Debug, Clone)]
pub struct Entity {
    components: Vec<Component>,
    visible: bool,
    cast_shadow: bool,
    receive_shadow: bool,

    generation: u64,
    pipelines: [Option<CachedPipeline>; PipelineSlot::COUNT],
    primitive: Option<PrimitiveHandle>,
    retired: Vec<RetiredResource>,
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
            visible: true,
            cast_shadow: true,
            receive_shadow: false,
            generation: 0,
            pipelines: [None; PipelineSlot::COUNT],
            primitive: None,
            retired: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.add_component(component);
        self
    }

    pub fn with_geometry(self, geometry: Geometry) -> Self {
        self.with_component(Component::Geometry(geometry))
    }

    pub fn with_material(self, material: Material) -> Self {
        self.with_component(Component::Material(material))
    }

    pub fn with_receive_shadow(mut self, receive: bool) -> Self {
        self.set_receive_shadow(receive);
        self
    }

    pub fn with_cast_shadow(mut self, cast: bool) -> Self {
        self.cast_shadow = cast;
        self
    }

    /// Attach a component, returning the one of the same type it replaces
    pub fn add_component(&mut self, component: Component) -> Option<Component> {
        if component.affects_pipeline() {
            self.content_changed(component.component_type() == ComponentType::Geometry);
        }
        let ty = component.component_type();
        match self.components.iter_mut().find(|c| c.component_type() == ty) {
            Some(slot) => Some(std::mem::replace(slot, component)),
            None => {
                self.components.push(component);
                None
            }
        }
    }

    pub fn remove_component(&mut self, ty: ComponentType) -> Option<Component> {
        let index = self.components.iter().position(|c| c.component_type() == ty)?;
        let removed = self.components.remove(index);
        if removed.affects_pipeline() {
            self.content_changed(ty == ComponentType::Geometry);
        }
        Some(removed)
    }

    pub fn component(&self, ty: ComponentType) -> Option<&Component> {
        self.components.iter().find(|c| c.component_type() == ty)
    }

    pub fn has_component(&self, ty: ComponentType) -> bool {
        self.component(ty).is_some()
    }

    /// Components in attachment order
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.components.iter().find_map(|c| match c {
            Component::Geometry(g) => Some(g),
            _ => None,
        })
    }

    pub fn material(&self) -> Option<&Material> {
        self.components.iter().find_map(|c| match c {
            Component::Material(m) => Some(m),
            _ => None,
        })
    }

    /// Mutable material access.
    ///
    /// Any texture may be reassigned through the returned reference, so the
    /// cached color pipelines are dropped up front.
    pub fn material_mut(&mut self) -> Option<&mut Material> {
        if !self.has_component(ComponentType::Material) {
            return None;
        }
        self.content_changed(false);
        self.find_material_mut()
    }

    fn find_material_mut(&mut self) -> Option<&mut Material> {
        self.components.iter_mut().find_map(|c| match c {
            Component::Material(m) => Some(m),
            _ => None,
        })
    }

    pub fn light(&self) -> Option<&Light> {
        self.components.iter().find_map(|c| match c {
            Component::Light(l) => Some(l),
            _ => None,
        })
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.components.iter().find_map(|c| match c {
            Component::Camera(camera) => Some(camera),
            _ => None,
        })
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        self.components.iter_mut().find_map(|c| match c {
            Component::Camera(camera) => Some(camera),
            _ => None,
        })
    }

    pub fn set_color_source(&mut self, asset: Option<TextureAsset>) -> bool {
        self.edit_material_textures(|m| m.color_source = asset)
    }

    pub fn set_normal_map(&mut self, asset: Option<TextureAsset>) -> bool {
        self.edit_material_textures(|m| m.normal_map = asset)
    }

    pub fn set_alpha_mask(&mut self, asset: Option<TextureAsset>) -> bool {
        self.edit_material_textures(|m| m.alpha_mask = asset)
    }

    /// Apply a texture edit; returns false when there is no material
    fn edit_material_textures<F: FnOnce(&mut Material)>(&mut self, edit: F) -> bool {
        match self.find_material_mut() {
            Some(material) => {
                edit(material);
                self.content_changed(false);
                true
            }
            None => false,
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn cast_shadow(&self) -> bool {
        self.cast_shadow
    }

    pub fn set_cast_shadow(&mut self, cast: bool) {
        self.cast_shadow = cast;
    }

    pub fn receive_shadow(&self) -> bool {
        self.receive_shadow
    }

    pub fn set_receive_shadow(&mut self, receive: bool) {
        if self.receive_shadow != receive {
            self.receive_shadow = receive;
            self.content_changed(false);
        }
    }

    /// Counter bumped whenever pipeline inputs change
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn content_changed(&mut self, geometry: bool) {
        self.generation += 1;
        for slot in self.pipelines.iter_mut() {
            if let Some(entry) = slot.take() {
                self.retired.push(RetiredResource::Pipeline(entry.handle));
            }
        }
        if geometry {
            if let Some(primitive) = self.primitive.take() {
                self.retired.push(RetiredResource::Primitive(primitive));
            }
        }
    }

    /// Cached pipeline of `slot`, only if built from the current content
    pub fn cached_pipeline(&self, slot: PipelineSlot) -> Option<PipelineHandle> {
        self.pipelines[slot.index()]
            .filter(|entry| entry.generation == self.generation)
            .map(|entry| entry.handle)
    }

    pub(crate) fn store_pipeline(&mut self, slot: PipelineSlot, handle: PipelineHandle) {
        let entry = CachedPipeline {
            handle,
            generation: self.generation,
        };
        if let Some(old) = self.pipelines[slot.index()].replace(entry) {
            if old.handle != handle {
                self.retired.push(RetiredResource::Pipeline(old.handle));
            }
        }
    }

    /// Null out the cached pipeline of `slot`
    pub fn invalidate_pipeline(&mut self, slot: PipelineSlot) {
        if let Some(entry) = self.pipelines[slot.index()].take() {
            self.retired.push(RetiredResource::Pipeline(entry.handle));
        }
    }

    pub fn cached_primitive(&self) -> Option<PrimitiveHandle> {
        self.primitive
    }

    pub(crate) fn store_primitive(&mut self, primitive: PrimitiveHandle) {
        if let Some(old) = self.primitive.replace(primitive) {
            self.retired.push(RetiredResource::Primitive(old));
        }
    }

    /// Take backend objects awaiting release
    pub(crate) fn drain_retired(&mut self) -> Vec<RetiredResource> {
        std::mem::take(&mut self.retired)
    }

    /// Take every backend object the entity holds, for destruction
    pub(crate) fn release_all(&mut self) -> Vec<RetiredResource> {
        for slot in 0..PipelineSlot::COUNT {
            if let Some(entry) = self.pipelines[slot].take() {
                self.retired.push(RetiredResource::Pipeline(entry.handle));
            }
        }
        if let Some(primitive) = self.primitive.take() {
            self.retired.push(RetiredResource::Primitive(primitive));
        }
        self.drain_retired()
    }
}
