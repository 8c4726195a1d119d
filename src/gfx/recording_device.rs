//! In-memory [`GraphicsDevice`] that records every call.
//!
//! Handles are drop-counted so tests can check that every resource created
//! during an upload is released again. Failures can be injected per shader
//! stage or per buffer label.

use std::{cell::Cell, rc::Rc};

use crate::{
    error::RenderError,
    gfx::device::{
        BufferAccess, BufferDesc, BufferKind, DrawBindings, DrawRange, GraphicsDevice,
        ShaderStage, VertexLayout,
    },
};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateBuffer {
        label: String,
        kind: BufferKind,
        access: BufferAccess,
        size: usize,
    },
    CompileProgram {
        stage: ShaderStage,
        label: String,
    },
    CreateInputLayout {
        stride: u64,
        attributes: Vec<&'static str>,
    },
    BindConstants {
        slots: Vec<String>,
    },
    WriteBuffer {
        label: String,
        data: Vec<u8>,
    },
    Bind {
        vertex_buffer: String,
        index_buffer: String,
    },
    DrawIndexed(DrawRange),
}

/// A fake GPU object. Dropping it decrements the device's live count.
#[derive(Debug)]
pub struct Handle {
    pub label: String,
    live: Rc<Cell<usize>>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Default)]
pub struct RecordingDevice {
    pub commands: Vec<Command>,
    pub fail_program: Option<ShaderStage>,
    pub fail_buffer: Option<String>,
    live: Rc<Cell<usize>>,
    bound: bool,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, label: impl Into<String>) -> Handle {
        self.live.set(self.live.get() + 1);
        Handle {
            label: label.into(),
            live: self.live.clone(),
        }
    }

    /// Number of handles created and not yet dropped.
    pub fn live_resources(&self) -> usize {
        self.live.get()
    }

    pub fn draws(&self) -> Vec<DrawRange> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::DrawIndexed(range) => Some(*range),
                _ => None,
            })
            .collect()
    }

    /// Every write to buffers whose label ends with `suffix`, in order.
    pub fn writes_to(&self, suffix: &str) -> Vec<&[u8]> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::WriteBuffer { label, data } if label.ends_with(suffix) => {
                    Some(data.as_slice())
                }
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|command| matches(command)).count()
    }
}

impl GraphicsDevice for RecordingDevice {
    type Buffer = Handle;
    type Program = Handle;
    type Pipeline = Handle;
    type ConstantBinding = Handle;

    fn create_buffer(
        &mut self,
        desc: &BufferDesc<'_>,
        contents: &[u8],
    ) -> Result<Handle, RenderError> {
        if self.fail_buffer.as_deref() == Some(desc.label) {
            return Err(RenderError::ResourceCreation {
                label: desc.label.to_owned(),
                message: "out of memory".into(),
            });
        }
        self.commands.push(Command::CreateBuffer {
            label: desc.label.to_owned(),
            kind: desc.kind,
            access: desc.access,
            size: contents.len(),
        });
        Ok(self.handle(desc.label))
    }

    fn compile_program(
        &mut self,
        stage: ShaderStage,
        label: &str,
        source: &str,
    ) -> Result<Handle, RenderError> {
        if self.fail_program == Some(stage) || source.is_empty() {
            return Err(RenderError::ShaderCompile {
                stage,
                label: label.to_owned(),
                message: "error: expected global declaration".into(),
            });
        }
        self.commands.push(Command::CompileProgram {
            stage,
            label: label.to_owned(),
        });
        Ok(self.handle(label))
    }

    fn create_input_layout(
        &mut self,
        vertex: &Handle,
        _pixel: &Handle,
        layout: &VertexLayout,
    ) -> Result<Handle, RenderError> {
        self.commands.push(Command::CreateInputLayout {
            stride: layout.stride,
            attributes: layout.attributes.iter().map(|a| a.semantic).collect(),
        });
        Ok(self.handle(format!("{} pipeline", vertex.label)))
    }

    fn bind_constants(
        &mut self,
        pipeline: &Handle,
        blocks: &[&Handle],
    ) -> Result<Handle, RenderError> {
        self.commands.push(Command::BindConstants {
            slots: blocks.iter().map(|block| block.label.clone()).collect(),
        });
        Ok(self.handle(format!("{} constants", pipeline.label)))
    }

    fn write_buffer(&mut self, buffer: &Handle, data: &[u8]) -> Result<(), RenderError> {
        self.commands.push(Command::WriteBuffer {
            label: buffer.label.clone(),
            data: data.to_vec(),
        });
        Ok(())
    }

    fn bind(&mut self, bindings: DrawBindings<'_, Self>) -> Result<(), RenderError> {
        self.commands.push(Command::Bind {
            vertex_buffer: bindings.vertex_buffer.label.clone(),
            index_buffer: bindings.index_buffer.label.clone(),
        });
        self.bound = true;
        Ok(())
    }

    fn draw_indexed(&mut self, range: DrawRange) -> Result<(), RenderError> {
        if !self.bound {
            return Err(RenderError::NothingBound);
        }
        self.commands.push(Command::DrawIndexed(range));
        Ok(())
    }
}
