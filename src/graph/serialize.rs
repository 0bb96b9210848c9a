use tracing::debug;
use crate::BoxGraph;
use crate::encoding::bufparser::BufParser;
use crate::encoding::tools::{calc_checksum, push_len, push_with_len};
use crate::graph::GraphError;
use crate::vertex::Vertex;

impl BoxGraph {
    /// Serialize every box. The output is an int32 box count followed by one length-prefixed
    /// record per box, in identifier order. Two equal graphs always produce the same bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_len(&mut out, self.boxes.len());
        for vertex in self.boxes.values() {
            push_with_len(&mut out, |out| vertex.write_record(out));
        }
        out
    }

    /// Load a graph written by [`to_bytes`](Self::to_bytes). Every pointer in the result resolves
    /// to a target accepting its type. Mandatory requirements aren't checked here, see
    /// [`validate_requirements`](Self::validate_requirements).
    pub fn from_bytes(bytes: &[u8]) -> Result<BoxGraph, GraphError> {
        let mut parser = BufParser(bytes);
        let count = parser.next_count()?;
        let mut graph = BoxGraph::new();
        for _ in 0..count {
            let mut record = BufParser(parser.next_len_prefixed()?);
            let vertex = Vertex::read_record(&mut record)?;
            record.expect_empty()?;
            if graph.boxes.contains_key(&vertex.id()) {
                return Err(GraphError::DuplicateIdentifier(vertex.id()));
            }
            graph.raw_insert(vertex);
        }
        parser.expect_empty()?;

        let pointers = graph.verify_pointers()?;
        debug!(boxes = count, pointers, "loaded graph");
        Ok(graph)
    }

    /// CRC32-C over the serialized graph. Cheap way to check two replicas agree.
    pub fn checksum(&self) -> u32 {
        calc_checksum(&self.to_bytes())
    }
}
