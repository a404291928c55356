use foundation::{FileUpload, GeoPoint};
use roxmltree::Node;

use crate::error::GeofileError;
use crate::geometry::{GeofileGeometry, Polygon};
use crate::parser::{GeofileParser, utf8};

/// KML placemarks: Points, LineStrings and Polygon outer rings.
#[derive(Debug, Default, Copy, Clone)]
pub struct KmlParser;

impl KmlParser {
    pub fn parse_str(&self, text: &str) -> Result<GeofileGeometry, GeofileError> {
        let document =
            roxmltree::Document::parse(text).map_err(|e| GeofileError::Parse(e.to_string()))?;
        let root = document.root_element();
        if root.tag_name().name() != "kml" {
            return Err(GeofileError::Parse(format!(
                "expected root <kml>, found <{}>",
                root.tag_name().name()
            )));
        }

        let mut points = Vec::new();
        let mut lines = Vec::new();
        let mut polygons = Vec::new();

        for node in root.descendants().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "Point" => {
                    if let Some(coords) = coordinates_of(node) {
                        points.extend(parse_coordinates(coords)?);
                    }
                }
                "LineString" => {
                    if let Some(coords) = coordinates_of(node) {
                        lines.push(parse_coordinates(coords)?);
                    }
                }
                "Polygon" => {
                    let ring = node
                        .descendants()
                        .find(|n| is_element_named(*n, "outerBoundaryIs"))
                        .and_then(|outer| {
                            outer
                                .descendants()
                                .find(|n| is_element_named(*n, "LinearRing"))
                        })
                        .and_then(coordinates_of);
                    if let Some(coords) = ring {
                        polygons.push(Polygon::new(parse_coordinates(coords)?));
                    }
                }
                _ => {}
            }
        }

        GeofileGeometry::new(points, lines, polygons)
    }
}

impl GeofileParser for KmlParser {
    fn parse(&self, file: &FileUpload) -> Result<GeofileGeometry, GeofileError> {
        self.parse_str(utf8(file)?)
    }
}

fn is_element_named(node: Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// Text of the direct `<coordinates>` child.
fn coordinates_of<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.children()
        .find(|c| is_element_named(*c, "coordinates"))
        .and_then(|c| c.text())
}

/// `lon,lat[,alt]` tuples separated by whitespace.
fn parse_coordinates(text: &str) -> Result<Vec<GeoPoint>, GeofileError> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',').map(str::trim);
            let mut next = |what: &str| -> Result<Option<f64>, GeofileError> {
                match parts.next() {
                    None | Some("") => Ok(None),
                    Some(raw) => raw.parse::<f64>().map(Some).map_err(|_| {
                        GeofileError::Parse(format!("invalid {what} '{raw}' in '{tuple}'"))
                    }),
                }
            };
            let lon = next("longitude")?;
            let lat = next("latitude")?;
            let alt = next("altitude")?;
            match (lon, lat) {
                (Some(lon), Some(lat)) => Ok(GeoPoint::new(lon, lat, alt.unwrap_or(0.0))),
                _ => Err(GeofileError::Parse(format!("incomplete coordinate '{tuple}'"))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::KmlParser;
    use crate::error::GeofileError;

    const AREA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>survey</name>
      <Polygon>
        <outerBoundaryIs>
          <LinearRing>
            <coordinates>
              10.0,10.0,0 11.0,10.0,0 11.0,11.0,0 10.0,11.0,0 10.0,10.0,0
            </coordinates>
          </LinearRing>
        </outerBoundaryIs>
      </Polygon>
    </Placemark>
    <Placemark>
      <Point><coordinates>10.5,10.5</coordinates></Point>
    </Placemark>
    <Placemark>
      <LineString><coordinates>10.1,10.1,5 10.2,10.2,5</coordinates></LineString>
    </Placemark>
  </Document>
</kml>"#;

    #[test]
    fn parses_polygon_point_and_line() {
        let g = KmlParser.parse_str(AREA).unwrap();
        assert_eq!(g.polygons.len(), 1);
        assert_eq!(g.polygons[0].vertices().len(), 4);
        assert_eq!(g.points.len(), 1);
        assert_eq!(g.lines[0][1].alt_m, 5.0);
        assert_eq!(
            (g.bounds.west, g.bounds.south, g.bounds.east, g.bounds.north),
            (10.0, 10.0, 11.0, 11.0)
        );
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        assert!(matches!(
            KmlParser.parse_str("<kml><Placemark>"),
            Err(GeofileError::Parse(_))
        ));
    }

    #[test]
    fn bad_number_is_reported() {
        let text = r#"<kml><Placemark><Point><coordinates>ten,10</coordinates></Point></Placemark></kml>"#;
        let err = KmlParser.parse_str(text).unwrap_err();
        assert!(err.to_string().contains("ten"), "{err}");
    }

    #[test]
    fn kml_without_geometry_is_rejected() {
        let text = "<kml><Document><name>empty</name></Document></kml>";
        assert_eq!(KmlParser.parse_str(text), Err(GeofileError::NoGeometry));
    }
}
