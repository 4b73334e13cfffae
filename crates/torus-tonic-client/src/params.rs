/// Immutable configuration of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    pub width: usize,
    pub height: usize,
    pub turns: u64,
    pub threads: usize,
}

impl Params {
    /// Name of the input image, `"<width>x<height>"`.
    pub fn input_name(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Name of an output image, `"<width>x<height>x<turn>"`.
    pub fn output_name(&self, turn: u64) -> String {
        format!("{}x{}x{turn}", self.width, self.height)
    }
}
